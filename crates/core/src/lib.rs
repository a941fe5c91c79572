pub mod category;
pub mod dates;
pub mod money;
pub mod page;
pub mod store;
pub mod transaction;
pub mod validate;

pub use category::{
    default_categories, learning_pattern, Category, CategoryAssignment, CategoryAttempt,
    CategoryKind, CategorySource, LearningRecord, DEFAULT_CATEGORIES,
};
pub use dates::{canonicalize_date, parse_statement_date, DateOrder, DateReading};
pub use money::Money;
pub use page::PageImage;
pub use store::{NewTransaction, StatementStore, StoreError};
pub use transaction::{CandidateFlag, Origin, TransactionCandidate, TxnType, ValidatedTransaction};
pub use validate::{validate, validate_all, ValidationError, ValidationResult, REVIEW_THRESHOLD};
