//! Thin wrapper over the read-only hero GraphQL endpoint. Paginates by
//! 200 until a short page, deduplicating by hero ID across pages (a
//! reorg or a slow indexer can otherwise surface the same hero twice).

use std::collections::HashSet;

use serde::Deserialize;

use crate::error::EngineError;
use crate::model::hero::HeroInfo;

const PAGE_SIZE: usize = 200;

#[derive(Debug, Deserialize)]
struct GraphQlEnvelope<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct HeroesByOwnerData {
    heroes: Vec<RawHero>,
}

#[derive(Debug, Deserialize)]
struct HeroByIdData {
    hero: Option<RawHero>,
}

#[derive(Debug, Deserialize)]
struct RawHero {
    id: String,
    owner: String,
    generation: u32,
    #[serde(rename = "statGenes")]
    stat_genes: String,
    #[serde(rename = "visualGenes")]
    visual_genes: String,
    #[serde(rename = "summonsRemaining")]
    summons_remaining: u32,
    #[serde(rename = "maxSummons")]
    max_summons: u32,
}

impl From<RawHero> for HeroInfo {
    fn from(h: RawHero) -> Self {
        HeroInfo {
            id: h.id.parse().unwrap_or_default(),
            owner: h.owner.to_lowercase(),
            generation: h.generation,
            stat_genes: h.stat_genes,
            visual_genes: h.visual_genes,
            summons_remaining: h.summons_remaining,
            max_summons: h.max_summons,
        }
    }
}

pub struct HeroGraphQlClient {
    http: reqwest::Client,
    endpoint: String,
}

impl HeroGraphQlClient {
    pub fn new(http: reqwest::Client, endpoint: String) -> Self {
        HeroGraphQlClient { http, endpoint }
    }

    async fn post<T: for<'de> Deserialize<'de>>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T, EngineError> {
        let body = serde_json::json!({ "query": query, "variables": variables });
        let resp = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::TransientUpstream(format!("hero graphql request failed: {e}")))?;

        if resp.status().is_server_error() {
            return Err(EngineError::TransientUpstream(format!(
                "hero graphql returned {}",
                resp.status()
            )));
        }
        if !resp.status().is_success() {
            return Err(EngineError::PermanentUpstream(format!(
                "hero graphql returned {}",
                resp.status()
            )));
        }

        let envelope: GraphQlEnvelope<T> = resp
            .json()
            .await
            .map_err(|e| EngineError::PermanentUpstream(format!("hero graphql response malformed: {e}")))?;

        if let Some(errors) = envelope.errors {
            let msg = errors.into_iter().map(|e| e.message).collect::<Vec<_>>().join("; ");
            return Err(EngineError::PermanentUpstream(format!("hero graphql errors: {msg}")));
        }
        envelope
            .data
            .ok_or_else(|| EngineError::PermanentUpstream("hero graphql response had no data".into()))
    }

    pub async fn get_hero_by_id(&self, id: u64) -> Result<Option<HeroInfo>, EngineError> {
        const QUERY: &str = r#"
            query HeroById($id: ID!) {
                hero(id: $id) {
                    id owner generation statGenes visualGenes summonsRemaining maxSummons
                }
            }
        "#;
        let data: HeroByIdData = crate::chain::retry::with_retry(|| async {
            self.post(QUERY, serde_json::json!({ "id": id.to_string() })).await
        })
        .await?;
        Ok(data.hero.map(HeroInfo::from))
    }

    /// Paginates by `PAGE_SIZE` until a short page is returned,
    /// deduplicating by hero ID across pages.
    pub async fn get_all_heroes_by_owner(&self, owner: &str) -> Result<Vec<HeroInfo>, EngineError> {
        const QUERY: &str = r#"
            query HeroesByOwner($owner: String!, $first: Int!, $skip: Int!) {
                heroes(where: { owner: $owner }, first: $first, skip: $skip) {
                    id owner generation statGenes visualGenes summonsRemaining maxSummons
                }
            }
        "#;
        let owner = owner.to_lowercase();
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut skip = 0usize;
        loop {
            let data: HeroesByOwnerData = crate::chain::retry::with_retry(|| async {
                self.post(
                    QUERY,
                    serde_json::json!({ "owner": owner, "first": PAGE_SIZE, "skip": skip }),
                )
                .await
            })
            .await?;

            let page_len = data.heroes.len();
            for raw in data.heroes {
                let hero: HeroInfo = raw.into();
                if seen.insert(hero.id) {
                    out.push(hero);
                }
            }
            if page_len < PAGE_SIZE {
                break;
            }
            skip += PAGE_SIZE;
        }
        Ok(out)
    }
}
