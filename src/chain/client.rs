//! Typed wrapper over JSON-RPC read endpoints: staking registry, LP pair,
//! ERC-20, and raw block/tx reads used to scan for native transfers to the
//! house wallet.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use alloy::primitives::{Address, B256, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{BlockTransactionsKind, Filter};
use alloy::sol;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::error::EngineError;
use crate::model::decimal::from_wei_str;

use super::retry::with_retry;
use super::types::{Chain, LpReserves, PoolInfo, Transfer, TxReceiptSummary};

sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    contract IStakingRegistry {
        function poolLength() external view returns (uint256);
        function poolInfo(uint256 pid) external view returns (
            address lpToken, uint256 allocPoint, uint256 lastRewardTime, uint256 accRewardPerShare
        );
        function totalAllocPoint() external view returns (uint256);
        function userInfo(uint256 pid, address user) external view returns (uint256 amount, uint256 rewardDebt);
        event RewardCollected(address indexed user, uint256 indexed pid, uint256 amount);
    }

    #[allow(missing_docs)]
    #[sol(rpc)]
    contract ILpPair {
        function token0() external view returns (address);
        function token1() external view returns (address);
        function getReserves() external view returns (uint112 reserve0, uint112 reserve1, uint32 blockTimestampLast);
        function totalSupply() external view returns (uint256);
        event Swap(address indexed sender, uint256 amount0In, uint256 amount1In, uint256 amount0Out, uint256 amount1Out, address indexed to);
    }

    #[allow(missing_docs)]
    #[sol(rpc)]
    contract IErc20 {
        function balanceOf(address account) external view returns (uint256);
        function decimals() external view returns (uint8);
        function symbol() external view returns (string);
        event Transfer(address indexed from, address indexed to, uint256 value);
    }

    #[allow(missing_docs)]
    #[sol(rpc)]
    contract IInfluenceOracle {
        function influenceOf(address wallet) external view returns (uint256);
    }

    #[allow(missing_docs)]
    #[sol(rpc)]
    contract IGovernanceLock {
        function lockEndTimestamp(address wallet) external view returns (uint256);
    }
}

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

async fn with_timeout<T>(
    fut: impl std::future::Future<Output = Result<T, impl std::fmt::Display>>,
    what: &str,
) -> Result<T, EngineError> {
    match tokio::time::timeout(DEFAULT_TIMEOUT, fut).await {
        Ok(Ok(v)) => Ok(v),
        Ok(Err(e)) => Err(EngineError::TransientUpstream(format!("{what}: {e}"))),
        Err(_) => Err(EngineError::TransientUpstream(format!("{what}: timed out"))),
    }
}

pub struct ChainClient {
    providers: HashMap<Chain, DynProvider>,
    house_wallet: Address,
}

impl ChainClient {
    pub fn new(rpc_urls: HashMap<Chain, String>, house_wallet: &str) -> anyhow::Result<Self> {
        let mut providers = HashMap::new();
        for (chain, url) in rpc_urls {
            let provider = ProviderBuilder::new()
                .connect_http(url.parse()?)
                .erased();
            providers.insert(chain, provider);
        }
        Ok(ChainClient {
            providers,
            house_wallet: house_wallet.parse()?,
        })
    }

    fn provider(&self, chain: Chain) -> Result<&DynProvider, EngineError> {
        self.providers
            .get(&chain)
            .ok_or_else(|| EngineError::Internal(format!("no RPC configured for {:?}", chain)))
    }

    pub async fn get_pool_length(&self, chain: Chain, registry: Address) -> Result<u32, EngineError> {
        let provider = self.provider(chain)?;
        with_retry(|| async {
            let contract = IStakingRegistry::new(registry, provider);
            let len = with_timeout(contract.poolLength().call(), "poolLength").await?;
            Ok(len.to::<u64>() as u32)
        })
        .await
    }

    pub async fn get_pool_info(
        &self,
        chain: Chain,
        registry: Address,
        pid: u32,
    ) -> Result<PoolInfo, EngineError> {
        let provider = self.provider(chain)?;
        with_retry(|| async {
            let contract = IStakingRegistry::new(registry, provider);
            let info = with_timeout(contract.poolInfo(U256::from(pid)).call(), "poolInfo").await?;
            let total_alloc = with_timeout(contract.totalAllocPoint().call(), "totalAllocPoint").await?;
            let alloc_point = info.allocPoint.to::<u64>();
            Ok(PoolInfo {
                pid,
                lp_token: info.lpToken.to_string(),
                alloc_point,
                total_alloc_point: total_alloc.to::<u64>(),
                archived: alloc_point == 0,
            })
        })
        .await
    }

    pub async fn get_lp_reserves(&self, chain: Chain, lp_token: Address) -> Result<LpReserves, EngineError> {
        let provider = self.provider(chain)?;
        with_retry(|| async {
            let contract = ILpPair::new(lp_token, provider);
            let reserves = with_timeout(contract.getReserves().call(), "getReserves").await?;
            let total_supply = with_timeout(contract.totalSupply().call(), "totalSupply").await?;
            Ok(LpReserves {
                reserve0: from_wei_str(&reserves.reserve0.to_string(), 18)
                    .map_err(|e| EngineError::PermanentUpstream(e.to_string()))?,
                reserve1: from_wei_str(&reserves.reserve1.to_string(), 18)
                    .map_err(|e| EngineError::PermanentUpstream(e.to_string()))?,
                total_supply: from_wei_str(&total_supply.to_string(), 18)
                    .map_err(|e| EngineError::PermanentUpstream(e.to_string()))?,
            })
        })
        .await
    }

    /// The pair's underlying token addresses, needed to price a pool
    /// through the shared price graph.
    pub async fn get_lp_tokens(&self, chain: Chain, lp_token: Address) -> Result<(Address, Address), EngineError> {
        let provider = self.provider(chain)?;
        with_retry(|| async {
            let contract = ILpPair::new(lp_token, provider);
            let (token0, token1) = tokio::join!(
                with_timeout(contract.token0().call(), "token0"),
                with_timeout(contract.token1().call(), "token1"),
            );
            Ok((token0?, token1?))
        })
        .await
    }

    pub async fn get_balance(&self, chain: Chain, wallet: &str) -> Result<Decimal, EngineError> {
        let provider = self.provider(chain)?;
        let addr = Address::from_str(wallet)
            .map_err(|e| EngineError::Validation(format!("invalid wallet address '{wallet}': {e}")))?;
        with_retry(|| async {
            let balance = with_timeout(provider.get_balance(addr), "get_balance").await?;
            from_wei_str(&balance.to_string(), 18).map_err(|e| EngineError::PermanentUpstream(e.to_string()))
        })
        .await
    }

    pub async fn get_erc20_symbol(&self, chain: Chain, token: Address) -> Result<String, EngineError> {
        let provider = self.provider(chain)?;
        with_retry(|| async {
            let contract = IErc20::new(token, provider);
            with_timeout(contract.symbol().call(), "symbol").await
        })
        .await
    }

    pub async fn get_erc20_decimals(&self, chain: Chain, token: Address) -> Result<u8, EngineError> {
        let provider = self.provider(chain)?;
        with_retry(|| async {
            let contract = IErc20::new(token, provider);
            with_timeout(contract.decimals().call(), "decimals").await
        })
        .await
    }

    pub async fn get_erc20_balance(&self, chain: Chain, token: Address, wallet: Address) -> Result<Decimal, EngineError> {
        let provider = self.provider(chain)?;
        with_retry(|| async {
            let contract = IErc20::new(token, provider);
            let (balance, decimals) = tokio::join!(
                with_timeout(contract.balanceOf(wallet).call(), "balanceOf"),
                with_timeout(contract.decimals().call(), "decimals"),
            );
            let balance = balance?;
            let decimals = decimals?;
            from_wei_str(&balance.to_string(), decimals as u32)
                .map_err(|e| EngineError::PermanentUpstream(e.to_string()))
        })
        .await
    }

    /// Scans `Transfer(_, house, value)` events in `[from_block, to_block]`.
    pub async fn query_transfer_events(
        &self,
        chain: Chain,
        token: Address,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<Transfer>, EngineError> {
        let provider = self.provider(chain)?;
        with_retry(|| async {
            let filter = Filter::new()
                .address(token)
                .event_signature(IErc20::Transfer::SIGNATURE_HASH)
                .topic2(self.house_wallet.into_word())
                .from_block(from_block)
                .to_block(to_block);
            let logs = with_timeout(provider.get_logs(&filter), "get_logs(Transfer)").await?;
            let mut out = Vec::with_capacity(logs.len());
            for log in logs {
                let decoded = log
                    .log_decode::<IErc20::Transfer>()
                    .map_err(|e| EngineError::PermanentUpstream(format!("undecodable Transfer log: {e}")))?;
                let amount = from_wei_str(&decoded.inner.value.to_string(), 18)
                    .map_err(|e| EngineError::PermanentUpstream(e.to_string()))?;
                out.push(Transfer {
                    tx_hash: log.transaction_hash.map(|h| h.to_string()).unwrap_or_default(),
                    from: format!("{:#x}", decoded.inner.from),
                    to: format!("{:#x}", decoded.inner.to),
                    amount,
                    token: Some(format!("{token:#x}")),
                    block_number: log.block_number.unwrap_or(0),
                    timestamp: None,
                });
            }
            Ok(out)
        })
        .await
    }

    /// Scans `Swap` events on one LP pair in `[from_block, to_block]` and
    /// sums `amount0In + amount0Out` / `amount1In + amount1Out` into a
    /// 24h-style per-token volume, at each token's own decimals.
    pub async fn query_swap_volume(
        &self,
        chain: Chain,
        lp_token: Address,
        decimals0: u32,
        decimals1: u32,
        from_block: u64,
        to_block: u64,
    ) -> Result<(Decimal, Decimal), EngineError> {
        let provider = self.provider(chain)?;
        with_retry(|| async {
            let filter = Filter::new()
                .address(lp_token)
                .event_signature(ILpPair::Swap::SIGNATURE_HASH)
                .from_block(from_block)
                .to_block(to_block);
            let logs = with_timeout(provider.get_logs(&filter), "get_logs(Swap)").await?;
            let mut volume0 = Decimal::ZERO;
            let mut volume1 = Decimal::ZERO;
            for log in logs {
                let decoded = log
                    .log_decode::<ILpPair::Swap>()
                    .map_err(|e| EngineError::PermanentUpstream(format!("undecodable Swap log: {e}")))?;
                let amount0 = decoded.inner.amount0In + decoded.inner.amount0Out;
                let amount1 = decoded.inner.amount1In + decoded.inner.amount1Out;
                volume0 += from_wei_str(&amount0.to_string(), decimals0)
                    .map_err(|e| EngineError::PermanentUpstream(e.to_string()))?;
                volume1 += from_wei_str(&amount1.to_string(), decimals1)
                    .map_err(|e| EngineError::PermanentUpstream(e.to_string()))?;
            }
            Ok((volume0, volume1))
        })
        .await
    }

    /// Scans `RewardCollected` events for one pool's `pid` in
    /// `[from_block, to_block]` and sums the distributed reward-token
    /// amount, at the reward token's own decimals.
    pub async fn query_reward_distributed(
        &self,
        chain: Chain,
        registry: Address,
        pid: u32,
        decimals: u32,
        from_block: u64,
        to_block: u64,
    ) -> Result<Decimal, EngineError> {
        let provider = self.provider(chain)?;
        let pid_topic = B256::from(U256::from(pid).to_be_bytes::<32>());
        with_retry(|| async {
            let filter = Filter::new()
                .address(registry)
                .event_signature(IStakingRegistry::RewardCollected::SIGNATURE_HASH)
                .topic2(pid_topic)
                .from_block(from_block)
                .to_block(to_block);
            let logs = with_timeout(provider.get_logs(&filter), "get_logs(RewardCollected)").await?;
            let mut total = Decimal::ZERO;
            for log in logs {
                let decoded = log
                    .log_decode::<IStakingRegistry::RewardCollected>()
                    .map_err(|e| EngineError::PermanentUpstream(format!("undecodable RewardCollected log: {e}")))?;
                total += from_wei_str(&decoded.inner.amount.to_string(), decimals)
                    .map_err(|e| EngineError::PermanentUpstream(e.to_string()))?;
            }
            Ok(total)
        })
        .await
    }

    /// Iterates each block's tx list in the range and keeps the ones with
    /// `to = house && value > 0 && status = success`.
    pub async fn query_native_transfers_to_house(
        &self,
        chain: Chain,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<Transfer>, EngineError> {
        let provider = self.provider(chain)?;
        let mut out = Vec::new();
        for block_num in from_block..=to_block {
            let block = with_retry(|| async {
                with_timeout(
                    provider.get_block_by_number(block_num.into()).kind(BlockTransactionsKind::Full),
                    "get_block_by_number",
                )
                .await
            })
            .await?;
            let Some(block) = block else { continue };
            for tx in block.transactions.txns() {
                let Some(to) = tx.to() else { continue };
                if to != self.house_wallet || tx.value().is_zero() {
                    continue;
                }
                let receipt = with_retry(|| async {
                    with_timeout(provider.get_transaction_receipt(*tx.inner.tx_hash()), "get_transaction_receipt")
                        .await
                })
                .await?;
                let Some(receipt) = receipt else { continue };
                if !receipt.status() {
                    continue;
                }
                let amount = from_wei_str(&tx.value().to_string(), 18)
                    .map_err(|e| EngineError::PermanentUpstream(e.to_string()))?;
                out.push(Transfer {
                    tx_hash: tx.inner.tx_hash().to_string(),
                    from: format!("{:#x}", tx.from),
                    to: format!("{to:#x}"),
                    amount,
                    token: None,
                    block_number: block_num,
                    timestamp: None,
                });
            }
        }
        Ok(out)
    }

    /// Fetches a receipt for the manual tx-hash verify path: requires
    /// `status == success`, checks are performed by the caller.
    pub async fn get_transaction_receipt(&self, chain: Chain, tx_hash: &str) -> Result<Option<TxReceiptSummary>, EngineError> {
        let provider = self.provider(chain)?;
        let hash = tx_hash
            .parse()
            .map_err(|e| EngineError::Validation(format!("invalid tx hash '{tx_hash}': {e}")))?;
        with_retry(|| async {
            let receipt = with_timeout(provider.get_transaction_receipt(hash), "get_transaction_receipt").await?;
            let Some(receipt) = receipt else { return Ok(None) };
            let tx = with_timeout(provider.get_transaction_by_hash(hash), "get_transaction_by_hash").await?;
            let Some(tx) = tx else { return Ok(None) };
            let value = from_wei_str(&tx.value().to_string(), 18)
                .map_err(|e| EngineError::PermanentUpstream(e.to_string()))?;
            Ok(Some(TxReceiptSummary {
                tx_hash: tx_hash.to_string(),
                from: format!("{:#x}", tx.from),
                to: tx.to().map(|a| format!("{a:#x}")),
                value,
                success: receipt.status(),
                block_number: receipt.block_number.unwrap_or(0),
            }))
        })
        .await
    }

    pub async fn get_block_number(&self, chain: Chain) -> Result<u64, EngineError> {
        let provider = self.provider(chain)?;
        with_retry(|| async { with_timeout(provider.get_block_number(), "get_block_number").await }).await
    }

    /// A wallet's staked LP amount in one garden pool (`userInfo(pid,
    /// wallet).amount`), used by the snapshot builder to find active LP
    /// positions without a dedicated indexer.
    pub async fn get_user_staked(&self, chain: Chain, registry: Address, pid: u32, wallet: Address) -> Result<Decimal, EngineError> {
        let provider = self.provider(chain)?;
        with_retry(|| async {
            let contract = IStakingRegistry::new(registry, provider);
            let info = with_timeout(contract.userInfo(U256::from(pid), wallet).call(), "userInfo").await?;
            from_wei_str(&info.amount.to_string(), 18).map_err(|e| EngineError::PermanentUpstream(e.to_string()))
        })
        .await
    }

    /// Reads a wallet's influence score from the configured oracle
    /// contract as a single `view` call.
    pub async fn get_influence(&self, chain: Chain, oracle: Address, wallet: Address) -> Result<Decimal, EngineError> {
        let provider = self.provider(chain)?;
        with_retry(|| async {
            let contract = IInfluenceOracle::new(oracle, provider);
            let value = with_timeout(contract.influenceOf(wallet).call(), "influenceOf").await?;
            from_wei_str(&value.to_string(), 18).map_err(|e| EngineError::PermanentUpstream(e.to_string()))
        })
        .await
    }

    /// Days remaining until a wallet's governance token lock expires, or
    /// `0` if already unlocked or never locked.
    pub async fn get_governance_lock_days_remaining(&self, chain: Chain, lock_contract: Address, wallet: Address, now: DateTime<Utc>) -> Result<u32, EngineError> {
        let provider = self.provider(chain)?;
        let end_ts = with_retry(|| async {
            let contract = IGovernanceLock::new(lock_contract, provider);
            let end = with_timeout(contract.lockEndTimestamp(wallet).call(), "lockEndTimestamp").await?;
            Ok(end.to::<u64>())
        })
        .await?;
        let Some(end) = DateTime::from_timestamp(end_ts as i64, 0) else {
            return Ok(0);
        };
        Ok((end - now).num_days().max(0) as u32)
    }
}
