//! Identity pipeline orchestrator.
//!
//! One run per page load, strictly sequential:
//!
//! ```text
//! Idle -> RoutingDecided -> IdentityResolved -> Enriched -> Terminal(Redirected)
//! Idle -> RoutingDecided -> Enriched -> Terminal(Disclosed)
//! ```
//!
//! Identity resolution always finishes before enrichment starts, and
//! enrichment before the redirect is composed. Only the enrichment lookup can
//! be cancelled, by its own timeout.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::config::PipelineConfig;
use crate::context::BrowserContext;
use crate::disclosure::{disclosure_fields, DisclosureField, DisclosureRenderer};
use crate::entropy;
use crate::error::{PipelineError, PipelineResult};
use crate::geo::{GeoEnrichment, GeoRecord, PLACEHOLDER};
use crate::identity::{derive_identifier, Identifier, IdentityStore};
use crate::redirect::{RedirectTarget, PARAM_IDENTIFIER, PARAM_LOCATION, PARAM_TIMEZONE};
use crate::request::{RequestParams, Route};

/// Route chosen from the incoming parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RouteKind {
    Redirect,
    Disclosure,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TerminalState {
    Redirected,
    Disclosed,
}

/// Pipeline progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipelineState {
    Idle,
    RoutingDecided(RouteKind),
    IdentityResolved,
    Enriched,
    Terminal(TerminalState),
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Idle => write!(f, "idle"),
            PipelineState::RoutingDecided(RouteKind::Redirect) => write!(f, "routing-decided(redirect)"),
            PipelineState::RoutingDecided(RouteKind::Disclosure) => {
                write!(f, "routing-decided(disclosure)")
            }
            PipelineState::IdentityResolved => write!(f, "identity-resolved"),
            PipelineState::Enriched => write!(f, "enriched"),
            PipelineState::Terminal(TerminalState::Redirected) => write!(f, "redirected"),
            PipelineState::Terminal(TerminalState::Disclosed) => write!(f, "disclosed"),
        }
    }
}

/// Identifier used for this run and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub identifier: Identifier,
    /// Freshly derived during this run rather than read from storage.
    pub minted: bool,
    /// Present in storage after this run.
    pub persisted: bool,
}

/// Result of a completed run.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    /// Navigation to `url` was issued.
    Redirected {
        url: String,
        identity: ResolvedIdentity,
        geo: GeoRecord,
    },
    /// The disclosure was handed to the renderer.
    Disclosed {
        fields: Vec<DisclosureField>,
        geo: GeoRecord,
    },
}

/// Orchestrates identity resolution, enrichment and the terminal action.
pub struct IdentityPipeline<C: ?Sized> {
    ctx: Arc<C>,
    config: PipelineConfig,
    store: IdentityStore<C>,
    geo: GeoEnrichment,
    state: PipelineState,
}

impl<C: BrowserContext + ?Sized> IdentityPipeline<C> {
    /// Validate `config` and build the pipeline for `ctx`.
    pub fn new(ctx: Arc<C>, config: PipelineConfig) -> PipelineResult<Self> {
        config.validate()?;
        let geo = GeoEnrichment::new(config.geo.clone())
            .map_err(|e| PipelineError::Setup(e.to_string()))?;
        Ok(Self::with_enrichment(ctx, config, geo))
    }

    /// Build with an existing enrichment client.
    pub fn with_enrichment(ctx: Arc<C>, config: PipelineConfig, geo: GeoEnrichment) -> Self {
        Self {
            store: IdentityStore::new(ctx.clone()),
            ctx,
            config,
            geo,
            state: PipelineState::Idle,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Drive the pipeline to a terminal state.
    ///
    /// `renderer` is only used on the disclosure route.
    #[instrument(skip_all, fields(routing_key = %self.config.routing_key))]
    pub async fn run<R>(&mut self, renderer: &R) -> PipelineResult<PipelineOutcome>
    where
        R: DisclosureRenderer + ?Sized,
    {
        if self.state != PipelineState::Idle {
            return Err(PipelineError::AlreadyRan);
        }

        let params = RequestParams::parse(&self.ctx.query_string(), &self.config.routing_key);
        match params.route() {
            Route::Redirect {
                target,
                passthrough,
            } => {
                self.transition(PipelineState::RoutingDecided(RouteKind::Redirect));
                self.redirect(&target, &passthrough).await
            }
            Route::Disclosure => {
                self.transition(PipelineState::RoutingDecided(RouteKind::Disclosure));
                Ok(self.disclose(renderer).await)
            }
        }
    }

    /// Reuse the stored identifier, or mint and persist a new one.
    ///
    /// Fails only when no identifier can be derived at all. A failed write
    /// is logged and the unpersisted identifier is still returned.
    pub fn resolve_identity(&self) -> PipelineResult<ResolvedIdentity> {
        let name = self.config.identity.cookie_name.as_str();

        if let Some(identifier) = self.store.read(name) {
            debug!(cookie = name, "Reusing stored identifier");
            return Ok(ResolvedIdentity {
                identifier,
                minted: false,
                persisted: true,
            });
        }

        let sample = entropy::collect(self.ctx.as_ref());
        let identifier = derive_identifier(self.ctx.as_ref(), &sample)
            .map_err(|e| PipelineError::IdentityGeneration(e.to_string()))?;

        let persisted = self
            .store
            .write(name, identifier.as_str(), self.config.identity.ttl_days)
            .is_ok();
        if !persisted {
            warn!(cookie = name, "Continuing with unpersisted identifier for this run");
        }

        info!(cookie = name, persisted, "Minted new identifier");
        Ok(ResolvedIdentity {
            identifier,
            minted: true,
            persisted,
        })
    }

    async fn redirect(
        &mut self,
        target: &str,
        passthrough: &[String],
    ) -> PipelineResult<PipelineOutcome> {
        // Reject unusable targets before anything is minted or written.
        let target = RedirectTarget::new(target)?;

        let identity = self.resolve_identity()?;
        self.transition(PipelineState::IdentityResolved);

        let geo = self.geo.fetch(self.config.geo.timeout_ms).await;
        self.transition(PipelineState::Enriched);

        let timezone = self
            .ctx
            .timezone()
            .filter(|tz| !tz.trim().is_empty())
            .unwrap_or_else(|| PLACEHOLDER.to_string());

        let url = target
            .with_passthrough(passthrough)
            .with_derived(PARAM_IDENTIFIER, identity.identifier.as_str())
            .with_derived(PARAM_TIMEZONE, &timezone)
            .with_derived(PARAM_LOCATION, &geo.location())
            .to_url();

        let delay = self.config.navigation_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        info!(minted = identity.minted, "Navigating to redirect target");
        self.ctx.navigate(&url);
        self.transition(PipelineState::Terminal(TerminalState::Redirected));

        Ok(PipelineOutcome::Redirected { url, identity, geo })
    }

    async fn disclose<R>(&mut self, renderer: &R) -> PipelineOutcome
    where
        R: DisclosureRenderer + ?Sized,
    {
        let sample = entropy::collect(self.ctx.as_ref());
        let geo = self.geo.fetch(self.config.geo.timeout_ms).await;
        self.transition(PipelineState::Enriched);

        let fields = disclosure_fields(self.ctx.as_ref(), &sample, &geo);
        renderer.render(&fields);
        self.transition(PipelineState::Terminal(TerminalState::Disclosed));

        PipelineOutcome::Disclosed { fields, geo }
    }

    fn transition(&mut self, next: PipelineState) {
        debug!(from = %self.state, to = %next, "Pipeline transition");
        self.state = next;
    }
}
