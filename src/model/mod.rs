pub mod classification;
pub mod decimal;
pub mod hero;
pub mod jewel_balance;
pub mod payment_job;
pub mod player;
pub mod pool;
pub mod pricing_config;
pub mod wallet_snapshot;

pub use classification::ClassificationVector;
pub use hero::{HeroGeneticRecord, HeroInfo};
pub use jewel_balance::{JewelBalance, Tier};
pub use payment_job::{PaymentJob, PaymentJobStatus};
pub use player::{Player, PlayerStatus, ProfileData};
pub use pool::GardenPool;
pub use pricing_config::PricingConfig;
pub use wallet_snapshot::WalletSnapshot;
