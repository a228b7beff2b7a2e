//! Cola de revisión humana.
//!
//! Cola acotada de operaciones cuya confianza nunca alcanzó el umbral. Al
//! llenarse expulsa el ítem más antiguo; cada ítem caduca `expire_hours`
//! después de encolarse. Un ítem también puede retirarse sin decisión cuando
//! la fase que lo originó deja de esperarlo.
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use bim_core::OperationOrigin;

use crate::envelope::ConfidenceEnvelope;
use crate::errors::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReviewDecision {
    Approve,
    Reject,
    /// Aprobar ejecutando parámetros corregidos por el revisor.
    ApproveModified,
}

impl ReviewDecision {
    pub fn is_approval(&self) -> bool {
        !matches!(self, ReviewDecision::Reject)
    }
}

impl FromStr for ReviewDecision {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s.chars()
                                  .filter(|c| !matches!(c, '-' | '_' | ' '))
                                  .flat_map(|c| c.to_lowercase())
                                  .collect();
        match normalized.as_str() {
            "approve" | "approved" => Ok(ReviewDecision::Approve),
            "reject" | "rejected" => Ok(ReviewDecision::Reject),
            "approvemodified" | "modify" | "modified" => Ok(ReviewDecision::ApproveModified),
            _ => Err(PipelineError::InvalidDecision(s.to_string())),
        }
    }
}

impl fmt::Display for ReviewDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReviewDecision::Approve => "Approve",
            ReviewDecision::Reject => "Reject",
            ReviewDecision::ApproveModified => "ApproveModified",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewItem {
    pub review_id: String,
    pub envelope: ConfidenceEnvelope,
    #[serde(default)]
    pub decision: Option<ReviewDecision>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub modified_params: Option<Value>,
    pub queued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ReviewItem {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub pending: usize,
    pub max_size: usize,
    pub expire_hours: u32,
    pub enqueued_total: u64,
    pub evicted_total: u64,
    pub expired_total: u64,
    pub resolved_total: u64,
    #[serde(default)]
    pub withdrawn_total: u64,
    pub oldest_queued_at: Option<DateTime<Utc>>,
    pub by_method: BTreeMap<String, usize>,
}

#[derive(Debug, Clone)]
pub struct ReviewQueueManager {
    items: VecDeque<ReviewItem>,
    max_size: usize,
    expire_hours: u32,
    enqueued_total: u64,
    evicted_total: u64,
    expired_total: u64,
    resolved_total: u64,
    withdrawn_total: u64,
}

impl ReviewQueueManager {
    pub fn new(max_size: usize, expire_hours: u32) -> Self {
        Self { items: VecDeque::new(),
               max_size: max_size.max(1),
               expire_hours,
               enqueued_total: 0,
               evicted_total: 0,
               expired_total: 0,
               resolved_total: 0,
               withdrawn_total: 0 }
    }

    /// Restaura ítems persistidos (orden de encolado). Si exceden la capacidad
    /// se conservan los más recientes.
    pub fn restore(&mut self, mut items: Vec<ReviewItem>) {
        items.sort_by_key(|i| i.queued_at);
        let skip = items.len().saturating_sub(self.max_size);
        self.items = items.into_iter().skip(skip).collect();
    }

    /// Encola `envelope` y devuelve el ítem creado junto con el expulsado por
    /// capacidad, si lo hubo.
    pub fn enqueue(&mut self, mut envelope: ConfidenceEnvelope) -> (ReviewItem, Option<ReviewItem>) {
        let now = Utc::now();
        let review_id = Uuid::new_v4().to_string();
        envelope.review_id = Some(review_id.clone());
        let item = ReviewItem { review_id,
                                envelope,
                                decision: None,
                                notes: None,
                                modified_params: None,
                                queued_at: now,
                                expires_at: now + Duration::hours(i64::from(self.expire_hours)) };
        let evicted = if self.items.len() >= self.max_size {
            self.evicted_total += 1;
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item.clone());
        self.enqueued_total += 1;
        (item, evicted)
    }

    pub fn get(&self, review_id: &str) -> Option<&ReviewItem> {
        self.items.iter().find(|i| i.review_id == review_id)
    }

    /// Ítem pendiente de la misma operación (misma huella y mismo origen),
    /// sin contar los de `skip`.
    pub fn find_pending(&self,
                        fingerprint: &str,
                        origin: Option<OperationOrigin>,
                        skip: &HashSet<String>)
                        -> Option<&ReviewItem> {
        if fingerprint.is_empty() {
            return None;
        }
        self.items.iter().find(|i| {
                              i.envelope.fingerprint == fingerprint
                              && i.envelope.origin == origin
                              && !skip.contains(&i.review_id)
                          })
    }

    /// Retira sin resolverlos los ítems de `review_ids` que sigan en cola.
    pub fn withdraw(&mut self, review_ids: &[String]) -> Vec<ReviewItem> {
        let (gone, kept): (Vec<ReviewItem>, Vec<ReviewItem>) =
            self.items.drain(..).partition(|i| review_ids.contains(&i.review_id));
        self.items = kept.into();
        self.withdrawn_total += gone.len() as u64;
        gone
    }

    /// Retira un ítem para resolverlo.
    pub fn take(&mut self, review_id: &str) -> Option<ReviewItem> {
        let pos = self.items.iter().position(|i| i.review_id == review_id)?;
        self.resolved_total += 1;
        self.items.remove(pos)
    }

    /// Elimina y devuelve los ítems caducados a `now`.
    pub fn purge_expired(&mut self, now: DateTime<Utc>) -> Vec<ReviewItem> {
        let (expired, alive): (Vec<ReviewItem>, Vec<ReviewItem>) =
            self.items.drain(..).partition(|i| i.is_expired(now));
        self.items = alive.into();
        self.expired_total += expired.len() as u64;
        expired
    }

    /// Ítems pendientes, del más antiguo al más reciente.
    pub fn pending(&self) -> Vec<ReviewItem> {
        self.items.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn stats(&self) -> QueueStats {
        let mut by_method: BTreeMap<String, usize> = BTreeMap::new();
        for item in &self.items {
            *by_method.entry(item.envelope.method.clone()).or_default() += 1;
        }
        QueueStats { pending: self.items.len(),
                     max_size: self.max_size,
                     expire_hours: self.expire_hours,
                     enqueued_total: self.enqueued_total,
                     evicted_total: self.evicted_total,
                     expired_total: self.expired_total,
                     resolved_total: self.resolved_total,
                     withdrawn_total: self.withdrawn_total,
                     oldest_queued_at: self.items.front().map(|i| i.queued_at),
                     by_method }
    }
}
