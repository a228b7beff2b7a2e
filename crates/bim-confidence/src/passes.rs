//! Bucle multi-pase de admisión.
//!
//! Cada pase puntúa todas las operaciones pendientes antes de ejecutar
//! ninguna; las que alcanzan el umbral efectivo del pase se ejecutan en orden,
//! el resto se difiere al pase siguiente, donde se vuelve a puntuar con los
//! ids creados hasta entonces. Tras el último pase las pendientes quedan
//! `Queued`. Los pases son estrictamente secuenciales.
//!
//! Si el calculador falla cuando ya hay operaciones ejecutadas, el bucle se
//! detiene: lo ejecutado se conserva y las no procesadas siguen `Pending`,
//! sin encolarse.
use bim_core::phase::{call_with_timeout, created_ids};
use bim_core::BuildExecutor;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::calculator::{ConfidenceCalculator, ScoringContext};
use crate::envelope::{ConfidenceEnvelope, EnvelopeStatus};
use crate::errors::PipelineError;
use crate::thresholds::{clears, ThresholdTable};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassSummary {
    pub pass: u32,
    pub evaluated: usize,
    pub executed: usize,
    pub failed: usize,
    pub deferred: usize,
}

#[derive(Debug, Clone)]
pub struct PassOutcome {
    pub envelopes: Vec<ConfidenceEnvelope>,
    pub passes: Vec<PassSummary>,
    /// Error del calculador que cortó el bucle tras ejecutar parte del lote.
    pub interrupted: Option<String>,
}

pub struct PassCoordinator<'a> {
    calculator: &'a dyn ConfidenceCalculator,
    thresholds: &'a ThresholdTable,
    build: &'a dyn BuildExecutor,
    max_passes: u32,
    timeout: Duration,
}

impl<'a> PassCoordinator<'a> {
    pub fn new(calculator: &'a dyn ConfidenceCalculator,
               thresholds: &'a ThresholdTable,
               build: &'a dyn BuildExecutor,
               max_passes: u32,
               timeout: Duration)
               -> Self {
        Self { calculator,
               thresholds,
               build,
               max_passes: max_passes.max(1),
               timeout }
    }

    /// Lleva cada envelope a un estado terminal. Sin `auto_execute` se
    /// puntúa una sola vez y todo queda `Queued`.
    pub async fn run(&self,
                     mut envelopes: Vec<ConfidenceEnvelope>,
                     auto_execute: bool,
                     known_ids: HashSet<String>)
                     -> Result<PassOutcome, PipelineError> {
        let mut pending: Vec<usize> = (0..envelopes.len()).collect();
        let mut known = known_ids;
        let mut passes = Vec::new();
        let mut interrupted = None;

        'passes: for pass in 1..=self.max_passes {
            if pending.is_empty() {
                break;
            }
            let ctx = ScoringContext { pass,
                                       known_ids: known.clone() };
            let mut scored = Vec::with_capacity(pending.len());
            for &i in &pending {
                let env = &envelopes[i];
                match self.calculator.score(&env.method, &env.params, &ctx) {
                    Ok(score) => scored.push((i, score)),
                    Err(e) if envelopes.iter().any(|other| other.status.is_terminal()) => {
                        warn!("scoring failed after partial execution pass={pass} unprocessed={} error={e}",
                              pending.len());
                        interrupted = Some(e.to_string());
                        break 'passes;
                    }
                    Err(e) => return Err(e),
                }
            }

            let mut summary = PassSummary { pass,
                                            evaluated: pending.len(),
                                            ..PassSummary::default() };
            let mut deferred = Vec::new();
            for (i, score) in scored {
                let threshold = self.thresholds.effective(&envelopes[i].method, pass);
                let env = &mut envelopes[i];
                env.confidence = score.value;
                env.factors = score.factors;
                env.pass = pass;
                if !auto_execute || !clears(score.value, threshold) {
                    deferred.push(i);
                    continue;
                }
                match call_with_timeout(self.build, &env.method, &env.params, self.timeout).await {
                    Ok(result) => {
                        let ids = created_ids(&result);
                        let status = if ids.is_empty() {
                            EnvelopeStatus::Executed
                        } else {
                            EnvelopeStatus::Verified
                        };
                        known.extend(ids);
                        env.result = Some(result);
                        env.set_status(status);
                        summary.executed += 1;
                    }
                    Err(e) => {
                        env.error = Some(e.to_string());
                        env.set_status(EnvelopeStatus::Failed);
                        summary.failed += 1;
                    }
                }
            }
            summary.deferred = deferred.len();
            debug!("pass finished pass={pass} evaluated={} executed={} failed={} deferred={}",
                   summary.evaluated,
                   summary.executed,
                   summary.failed,
                   summary.deferred);
            passes.push(summary);
            pending = deferred;
            if !auto_execute {
                break;
            }
        }

        if interrupted.is_none() {
            for i in pending {
                envelopes[i].set_status(EnvelopeStatus::Queued);
            }
        }
        Ok(PassOutcome { envelopes,
                         passes,
                         interrupted })
    }
}
