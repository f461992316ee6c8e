//! Suggests the expense account for a transaction from its amount and payee,
//! learned from the ledger's posting history.

mod bayes;
mod store;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tally_core::RegisterRow;

pub use bayes::{NaiveBayes, AMOUNT_PRECISION};
pub use store::{FileModelStore, MemoryModelStore, ModelStore, MODEL_FILE_NAME};

use crate::error::ClassifierError;

pub const SNAPSHOT_VERSION: u32 = 1;

/// Vocabulary entry every unseen payee maps to. Always index 0.
pub const UNKNOWN_PAYEE: &str = "Unknown Payee";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiableTransaction {
    pub amount: f64,
    pub payee: Option<String>,
}

impl ClassifiableTransaction {
    pub fn new(amount: f64, payee: impl Into<String>) -> Self {
        Self {
            amount,
            payee: Some(payee.into()),
        }
    }
}

pub trait TransactionClassifier: Send + Sync {
    /// The predicted account name, or `None` when no prediction is possible.
    fn classify(&self, tx: &ClassifiableTransaction) -> Result<Option<String>, ClassifierError>;
}

/// Class labels, payee vocabulary and trained model, persisted as one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub version: u32,
    pub classes: Vec<String>,
    pub payees: BTreeMap<String, usize>,
    pub bayes: NaiveBayes,
}

impl ModelSnapshot {
    /// Builds a fresh model from `rows`, labelled by posting account. Returns
    /// `None` when there are no accounts to learn.
    pub fn train<'a>(
        rows: impl IntoIterator<Item = &'a RegisterRow>,
        accounts: &BTreeSet<String>,
    ) -> Option<ModelSnapshot> {
        if accounts.is_empty() {
            return None;
        }

        let mut classes: Vec<String> = accounts.iter().cloned().collect();
        // The model needs two classes at least.
        if classes.len() == 1 {
            classes.insert(0, String::new());
        }
        let class_index: BTreeMap<&str, usize> = classes
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();

        let mut payees = BTreeMap::from([(UNKNOWN_PAYEE.to_string(), 0)]);
        let mut bayes = NaiveBayes::new(classes.len());

        for row in rows {
            let Some(&class) = class_index.get(row.account.full_name.as_str()) else {
                tracing::debug!(account = %row.account.full_name, "skipping row outside the trained accounts");
                continue;
            };
            let next = payees.len();
            let payee = *payees.entry(row.payee.clone()).or_insert(next);
            bayes.update(class, row.amount.value, payee);
        }

        Some(ModelSnapshot {
            version: SNAPSHOT_VERSION,
            classes,
            payees,
            bayes,
        })
    }

    pub fn classify(&self, tx: &ClassifiableTransaction) -> Option<&str> {
        let payee = tx
            .payee
            .as_deref()
            .and_then(|p| self.payees.get(p))
            .copied()
            .unwrap_or(0);

        let class = self.bayes.predict(tx.amount, payee)?;
        self.classes
            .get(class)
            .map(String::as_str)
            .filter(|label| !label.is_empty())
    }
}

/// Naive Bayes classifier backed by a [`ModelStore`]. The model is loaded on
/// first use and kept until the next retrain.
pub struct BayesClassifier<S: ModelStore> {
    store: S,
    model: RwLock<Option<Arc<ModelSnapshot>>>,
}

impl<S: ModelStore> BayesClassifier<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            model: RwLock::new(None),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Replaces the persisted model with one trained on `rows`. Returns `false`
    /// and leaves the model untouched when `accounts` is empty.
    pub fn retrain<'a>(
        &self,
        rows: impl IntoIterator<Item = &'a RegisterRow>,
        accounts: &BTreeSet<String>,
    ) -> Result<bool, ClassifierError> {
        let Some(snapshot) = ModelSnapshot::train(rows, accounts) else {
            return Ok(false);
        };

        self.store.save(&snapshot)?;
        tracing::info!(
            classes = snapshot.classes.len(),
            payees = snapshot.payees.len(),
            instances = snapshot.bayes.instances(),
            "classifier retrained"
        );

        *self.model.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(snapshot));
        Ok(true)
    }

    fn model(&self) -> Result<Arc<ModelSnapshot>, ClassifierError> {
        if let Some(model) = self.model.read().unwrap_or_else(PoisonError::into_inner).as_ref() {
            return Ok(Arc::clone(model));
        }

        let loaded = self.store.load()?.ok_or(ClassifierError::ModelNotTrained)?;
        tracing::info!(classes = loaded.classes.len(), "classifier model loaded");

        let mut guard = self.model.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(guard.get_or_insert_with(|| Arc::new(loaded))))
    }
}

impl<S: ModelStore> TransactionClassifier for BayesClassifier<S> {
    fn classify(&self, tx: &ClassifiableTransaction) -> Result<Option<String>, ClassifierError> {
        let model = self.model()?;
        Ok(model.classify(tx).map(str::to_string))
    }
}
