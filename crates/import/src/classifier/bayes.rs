//! Updateable naive Bayes over one numeric attribute (amount) and one nominal
//! attribute (payee index) whose vocabulary may grow between updates.

use serde::{Deserialize, Serialize};

/// Resolution of amounts; values are rounded to this before estimation.
pub const AMOUNT_PRECISION: f64 = 0.01;

/// Floor applied to every probability before taking its logarithm.
const MIN_PROBABILITY: f64 = 1e-75;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct NormalEstimator {
    weight: f64,
    sum: f64,
    sum_sq: f64,
}

impl NormalEstimator {
    fn add(&mut self, value: f64) {
        let value = round_to_precision(value);
        self.weight += 1.0;
        self.sum += value;
        self.sum_sq += value * value;
    }

    fn mean(&self) -> f64 {
        if self.weight > 0.0 {
            self.sum / self.weight
        } else {
            0.0
        }
    }

    fn std_dev(&self) -> f64 {
        let floor = AMOUNT_PRECISION / 6.0;
        if self.weight <= 0.0 {
            return floor;
        }
        let mean = self.mean();
        let variance = (self.sum_sq - mean * self.sum).abs() / self.weight;
        variance.sqrt().max(floor)
    }

    /// Probability mass of the bucket of width [`AMOUNT_PRECISION`] around `value`.
    fn probability(&self, value: f64) -> f64 {
        let value = round_to_precision(value);
        let sd = self.std_dev();
        let z = (value - self.mean()) / sd;
        let density = (-0.5 * z * z).exp() / (sd * (2.0 * std::f64::consts::PI).sqrt());
        density * AMOUNT_PRECISION
    }
}

/// Laplace-smoothed counts over nominal indices; unseen indices count as zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct DiscreteEstimator {
    counts: Vec<f64>,
    total: f64,
}

impl DiscreteEstimator {
    fn add(&mut self, index: usize) {
        if self.counts.len() <= index {
            self.counts.resize(index + 1, 0.0);
        }
        self.counts[index] += 1.0;
        self.total += 1.0;
    }

    fn probability(&self, index: usize, vocabulary: usize) -> f64 {
        let count = self.counts.get(index).copied().unwrap_or(0.0);
        (count + 1.0) / (self.total + vocabulary.max(1) as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NaiveBayes {
    class_counts: Vec<f64>,
    amounts: Vec<NormalEstimator>,
    payees: Vec<DiscreteEstimator>,
    vocabulary: usize,
    instances: u64,
}

impl NaiveBayes {
    /// An untrained model over `classes` labels and a vocabulary holding only index 0.
    pub fn new(classes: usize) -> Self {
        Self {
            class_counts: vec![1.0; classes],
            amounts: vec![NormalEstimator::default(); classes],
            payees: vec![DiscreteEstimator::default(); classes],
            vocabulary: 1,
            instances: 0,
        }
    }

    pub fn classes(&self) -> usize {
        self.class_counts.len()
    }

    pub fn instances(&self) -> u64 {
        self.instances
    }

    /// Folds one labelled instance into the model. Out-of-range classes are ignored.
    pub fn update(&mut self, class: usize, amount: f64, payee: usize) {
        if class >= self.classes() || !amount.is_finite() {
            return;
        }
        self.class_counts[class] += 1.0;
        self.amounts[class].add(amount);
        self.payees[class].add(payee);
        self.vocabulary = self.vocabulary.max(payee + 1);
        self.instances += 1;
    }

    /// Most probable class, or `None` when nothing has been learned yet or the
    /// posterior cannot be computed.
    pub fn predict(&self, amount: f64, payee: usize) -> Option<usize> {
        if self.instances == 0 || !amount.is_finite() {
            return None;
        }

        let class_total: f64 = self.class_counts.iter().sum();
        let mut best: Option<(usize, f64)> = None;

        for class in 0..self.classes() {
            let prior = self.class_counts[class] / class_total;
            let p_amount = self.amounts[class].probability(amount);
            let p_payee = self.payees[class].probability(payee, self.vocabulary);

            let score = [prior, p_amount, p_payee]
                .iter()
                .map(|p| p.max(MIN_PROBABILITY).ln())
                .sum::<f64>();

            if !score.is_finite() {
                return None;
            }
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((class, score));
            }
        }

        best.map(|(class, _)| class)
    }
}

fn round_to_precision(value: f64) -> f64 {
    (value / AMOUNT_PRECISION).round() * AMOUNT_PRECISION
}
