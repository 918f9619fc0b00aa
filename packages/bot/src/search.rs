//! Offer polling and contact pipeline.
//!
//! Pipeline per cycle:
//! 1. Fetch the current offer search results
//! 2. For each offer not in the ledger:
//!    a. Fetch the full offer detail
//!    b. Generate a personalized message
//!    c. Send it and record the offer in the ledger
//! 3. Return stats (offers_seen, skipped, contacted, errors)
//!
//! Per-offer failures are logged and skipped so one bad listing never
//! stops a cycle. A failed contact leaves the offer out of the ledger,
//! so it is retried next cycle.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tracing::{debug, error, info, warn};
use wg_gesucht_client::{OfferDetail, OfferFilter, OfferSummary, WgClient, WgError};

use crate::composer::MessageComposer;
use crate::config::Config;
use crate::ledger::{ContactLedger, ContactedOffer};
use crate::session_store;

/// Offer operations the pipeline needs (trait to allow mocking).
#[async_trait]
pub trait OfferApi: Send + Sync {
    async fn offers(&self, filter: &OfferFilter) -> wg_gesucht_client::Result<Vec<OfferSummary>>;
    async fn offer_detail(&self, offer_id: &str) -> wg_gesucht_client::Result<OfferDetail>;
    async fn contact_offer(
        &self,
        offer_id: &str,
        message: &str,
    ) -> wg_gesucht_client::Result<Vec<Value>>;
}

#[async_trait]
impl OfferApi for WgClient {
    async fn offers(&self, filter: &OfferFilter) -> wg_gesucht_client::Result<Vec<OfferSummary>> {
        WgClient::offers(self, filter).await
    }

    async fn offer_detail(&self, offer_id: &str) -> wg_gesucht_client::Result<OfferDetail> {
        WgClient::offer_detail(self, offer_id).await
    }

    async fn contact_offer(
        &self,
        offer_id: &str,
        message: &str,
    ) -> wg_gesucht_client::Result<Vec<Value>> {
        WgClient::contact_offer(self, offer_id, message).await
    }
}

/// Counters for one search cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleStats {
    pub offers_seen: usize,
    pub skipped: usize,
    pub contacted: usize,
    pub errors: usize,
}

/// Run one search cycle: fetch matching offers, message the new ones,
/// and record them in the ledger.
///
/// With `dry_run` set, messages are generated and logged but nothing is
/// sent and the ledger stays untouched.
pub async fn run_cycle(
    api: &dyn OfferApi,
    composer: &dyn MessageComposer,
    ledger: &mut ContactLedger,
    filter: &OfferFilter,
    dry_run: bool,
) -> Result<CycleStats> {
    let mut stats = CycleStats::default();

    let offers = api.offers(filter).await.context("Offer search failed")?;
    stats.offers_seen = offers.len();

    if offers.is_empty() {
        info!("No offers found in this cycle");
        return Ok(stats);
    }
    info!(count = offers.len(), "Found offers");

    for offer in &offers {
        let offer_id = offer.offer_id.as_str();
        if ledger.contains(offer_id) {
            debug!(offer_id, "Offer already contacted, skipping");
            stats.skipped += 1;
            continue;
        }
        let title = offer.offer_title.as_deref().unwrap_or("(untitled)");
        info!(offer_id, title, "Processing new offer");

        let detail = match api.offer_detail(offer_id).await {
            Ok(detail) => detail,
            Err(e) => {
                warn!(offer_id, error = %e, "Failed to fetch offer detail, skipping");
                stats.errors += 1;
                continue;
            }
        };

        let message = match composer.compose(&detail).await {
            Ok(message) => message,
            Err(e) => {
                warn!(offer_id, error = %e, "Failed to generate message, skipping");
                stats.errors += 1;
                continue;
            }
        };
        info!(offer_id, message = %message, "Generated application message");

        if dry_run {
            info!(offer_id, "Dry run, not contacting offer");
            continue;
        }

        match api.contact_offer(offer_id, &message).await {
            Ok(_) => {
                info!(offer_id, title = %detail.offer_title, "Contacted offer");
                stats.contacted += 1;
                let entry = ContactedOffer {
                    offer_id: offer_id.to_string(),
                    title: detail.offer_title.clone(),
                    url: detail.url.clone(),
                    timestamp: Utc::now(),
                };
                ledger
                    .record(entry)
                    .context("Failed to record contacted offer")?;
            }
            Err(e) if e.is_unauthorized() => {
                // Surface expired tokens to the caller so the session
                // can be refreshed. The offer is not in the ledger yet
                // and will be retried.
                return Err(e).context("Contact request rejected as unauthorized");
            }
            Err(e) => {
                error!(offer_id, error = %e, "Failed to contact offer, it will be retried next cycle");
                stats.errors += 1;
            }
        }
    }

    info!(
        offers_seen = stats.offers_seen,
        skipped = stats.skipped,
        contacted = stats.contacted,
        errors = stats.errors,
        "Search cycle completed"
    );
    Ok(stats)
}

/// Resolve the configured city name to its id. The first match wins,
/// like picking the top suggestion in the app.
pub async fn resolve_city(client: &WgClient, city: &str) -> Result<String> {
    let cities = client
        .find_cities(city)
        .await
        .context("City search failed")?;
    match cities.first() {
        Some(first) => {
            info!(city = %city, city_id = %first.city_id, city_name = %first.city_name, "Resolved city");
            Ok(first.city_id.clone())
        }
        None => bail!("No city found matching '{}'", city),
    }
}

/// Restore a saved session or log in fresh. Saved tokens are validated
/// with a profile fetch and refreshed once before falling back to a
/// full login.
pub async fn ensure_session(client: &mut WgClient, config: &Config) -> Result<()> {
    if let Some(session) = session_store::load(&config.session_path) {
        info!(user_id = %session.user_id, "Restored saved session");
        client.set_session(session);
        match client.my_profile().await {
            Ok(_) => return Ok(()),
            Err(e) if e.is_unauthorized() => {
                info!("Saved session expired, refreshing");
            }
            Err(e) => return Err(e).context("Session validation failed"),
        }
        match client.refresh_session().await {
            Ok(session) => {
                session_store::save(&config.session_path, &session)?;
                return Ok(());
            }
            Err(e) => {
                warn!(error = %e, "Session refresh failed, logging in fresh");
            }
        }
    }
    let session = client
        .login(&config.wg_email, &config.wg_password)
        .await
        .context("Login failed")?;
    session_store::save(&config.session_path, &session)?;
    Ok(())
}

/// Recover from an unauthorized error mid-run: refresh the session,
/// falling back to a fresh login.
async fn recover_auth(client: &mut WgClient, config: &Config) -> Result<()> {
    match client.refresh_session().await {
        Ok(session) => {
            session_store::save(&config.session_path, &session)?;
            Ok(())
        }
        Err(e) => {
            warn!(error = %e, "Session refresh failed, logging in fresh");
            let session = client
                .login(&config.wg_email, &config.wg_password)
                .await
                .context("Re-login failed")?;
            session_store::save(&config.session_path, &session)?;
            Ok(())
        }
    }
}

fn offer_filter(config: &Config, city_id: String) -> OfferFilter {
    OfferFilter::new(city_id)
        .max_rent(config.max_rent)
        .min_size(config.min_size)
        .max_flatmates(config.max_flatmates)
}

fn is_unauthorized(error: &anyhow::Error) -> bool {
    matches!(error.downcast_ref::<WgError>(), Some(e) if e.is_unauthorized())
}

/// Run the search loop until the process is stopped. Each cycle polls
/// the offer search and messages everything new, then sleeps. A failed
/// cycle is logged and retried after the same pause; expired sessions
/// are refreshed in place.
pub async fn run_loop(
    client: &mut WgClient,
    composer: &dyn MessageComposer,
    config: &Config,
    dry_run: bool,
) -> Result<()> {
    info!("Starting automated WG search");
    ensure_session(client, config).await?;
    let city_id = resolve_city(client, &config.city).await?;
    let filter = offer_filter(config, city_id);

    let mut ledger = ContactLedger::load(config.ledger_path.clone())?;
    info!(contacted = ledger.len(), "Loaded contact ledger");

    loop {
        info!("Starting new search cycle");
        if let Err(e) = run_cycle(&*client, composer, &mut ledger, &filter, dry_run).await {
            error!("Search cycle failed: {:#}", e);
            if is_unauthorized(&e) {
                if let Err(e) = recover_auth(client, config).await {
                    error!("Failed to recover session: {:#}", e);
                }
            }
        }
        info!(
            seconds = config.poll_interval.as_secs(),
            "Waiting before next cycle"
        );
        tokio::time::sleep(config.poll_interval).await;
    }
}

/// Run a single search cycle and return its stats.
pub async fn run_once(
    client: &mut WgClient,
    composer: &dyn MessageComposer,
    config: &Config,
    dry_run: bool,
) -> Result<CycleStats> {
    ensure_session(client, config).await?;
    let city_id = resolve_city(client, &config.city).await?;
    let filter = offer_filter(config, city_id);
    let mut ledger = ContactLedger::load(config.ledger_path.clone())?;
    run_cycle(&*client, composer, &mut ledger, &filter, dry_run).await
}
