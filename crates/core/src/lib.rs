pub mod account;
pub mod amount;
pub mod error;
pub mod filters;
pub mod grouping;
pub mod pagination;
pub mod period;
pub mod rule;
pub mod transaction;

pub use account::{build_account_tree, Account, ROOT_ACCOUNT};
pub use amount::{Amount, AmountParser, NumberFormat};
pub use error::LedgerError;
pub use filters::LedgerFilters;
pub use grouping::{CollectUntilChanged, GroupingExt};
pub use pagination::{paginate, Dir, Page, Pageable, Sort, DEFAULT_PAGE_SIZE};
pub use period::{DateRange, Interval};
pub use rule::{Captures, TransactionRegex};
pub use transaction::{AccountDetails, Posting, RegisterRow, Transaction};
