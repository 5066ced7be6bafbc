//! Data models for FinanControl API entities.
//!
//! - `UserProfile`: the signed-in user, as returned by login
//! - `Envelope`, `TotalResponse`: the `{ success, data }` response wrappers
//! - Account types: `Account`, `Card`, `CardSummary`, `InvoiceDetail`
//! - Money movements: `Transaction`, `Category`, `NewExpense`, `NewIncome`
//! - `YearMonth`: month selector for totals

pub mod account;
pub mod envelope;
pub mod transaction;
pub mod user;

mod de;

pub use account::{
    Account, Card, CardAccount, CardKind, CardRef, CardSummary, Installment, InstallmentPurchase,
    Invoice, InvoiceDetail, InvoiceProgress, NewAccount, NewCard,
};
pub use envelope::{Envelope, TotalResponse};
pub use transaction::{
    AccountRef, Category, NamedRef, NewExpense, NewIncome, PaymentMethod, Transaction,
    TransactionKind, YearMonth,
};
pub use user::{ProfileUpdate, UserId, UserProfile};
