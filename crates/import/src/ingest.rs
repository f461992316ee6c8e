use chrono::NaiveDate;
use tally_core::{AccountDetails, Transaction};

use crate::classifier::{ClassifiableTransaction, TransactionClassifier};
use crate::error::{ClassifierError, IngestError};
use crate::rules::RegexExtractor;

/// Extracts a transaction from text and, when it lands on the uncategorized
/// account, asks the classifier for a better one.
pub struct TransactionIngestor<'a, C: TransactionClassifier + ?Sized> {
    extractor: &'a RegexExtractor,
    classifier: &'a C,
    uncategorized: String,
}

impl<'a, C: TransactionClassifier + ?Sized> TransactionIngestor<'a, C> {
    pub fn new(
        extractor: &'a RegexExtractor,
        classifier: &'a C,
        uncategorized: impl Into<String>,
    ) -> Self {
        Self {
            extractor,
            classifier,
            uncategorized: uncategorized.into(),
        }
    }

    /// `Ok(None)` when no rule matches the text.
    pub fn ingest(&self, text: &str, today: NaiveDate) -> Result<Option<Transaction>, IngestError> {
        let Some((rule, tx)) = self.extractor.extract(text, today) else {
            tracing::debug!("no rule matched");
            return Ok(None);
        };
        tracing::debug!(rule, "extracted transaction");

        Ok(Some(self.categorize(tx)?))
    }

    fn categorize(&self, mut tx: Transaction) -> Result<Transaction, IngestError> {
        let Some(first) = tx.postings.first() else {
            return Ok(tx);
        };
        if first.account.full_name != self.uncategorized {
            return Ok(tx);
        }

        // Training rows are ^Expenses register amounts, which are positive.
        let query = ClassifiableTransaction {
            amount: first.amount.value.abs(),
            payee: Some(tx.payee.clone()),
        };

        match self.classifier.classify(&query) {
            Ok(Some(account)) => {
                tracing::info!(payee = %tx.payee, %account, "classified transaction");
                tx.postings[0].account = AccountDetails::new(account);
            }
            Ok(None) => {
                tracing::debug!(payee = %tx.payee, "classifier made no prediction");
            }
            Err(ClassifierError::ModelNotTrained) => {
                tracing::warn!("classifier has no model yet; keeping the uncategorized account");
            }
            Err(e) => return Err(e.into()),
        }
        Ok(tx)
    }
}
