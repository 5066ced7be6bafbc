//! Accounts, transactions, cards and profile endpoints.
//!
//! All of these are protected and go through the refresh gateway in
//! [`ApiClient::send`].

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use super::client::{ApiClient, ApiRequest};
use super::ApiError;
use crate::models::{
    Account, Card, CardSummary, Category, InvoiceDetail, NewAccount, NewCard, NewExpense,
    NewIncome, ProfileUpdate, TotalResponse, Transaction, TransactionKind, UserId, YearMonth,
};

/// Acknowledgement returned by create endpoints
#[derive(Debug, Default, Deserialize)]
struct Ack {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    erro: Option<String>,
    #[serde(default)]
    errors: Option<Value>,
}

impl Ack {
    /// A 2xx answer can still carry `success: false` with validation errors
    fn into_result(self) -> Result<(), ApiError> {
        if self.success == Some(false) || self.erro.is_some() {
            let detail = self
                .erro
                .or_else(|| self.errors.map(|e| e.to_string()))
                .unwrap_or_else(|| "request not accepted".to_string());
            return Err(ApiError::BadRequest(detail));
        }
        Ok(())
    }
}

impl ApiClient {
    async fn create(&self, request: ApiRequest) -> Result<(), ApiError> {
        let path = request.path().to_string();
        let response = self.send(&request).await?;
        let text = response.text().await?;
        // Empty 2xx bodies count as accepted
        let ack = if text.trim().is_empty() {
            Ack::default()
        } else {
            serde_json::from_str::<Ack>(&text).unwrap_or_default()
        };
        ack.into_result()?;
        debug!(path = %path, "Created");
        Ok(())
    }

    // ===== Accounts =====

    pub async fn fetch_accounts(&self, user_id: &UserId) -> Result<Vec<Account>, ApiError> {
        let accounts: Vec<Account> = self
            .fetch_data(ApiRequest::get(format!("/contas/user/{}", user_id)))
            .await?;
        debug!(count = accounts.len(), "Fetched accounts");
        Ok(accounts)
    }

    pub async fn create_account(&self, account: &NewAccount) -> Result<(), ApiError> {
        self.create(ApiRequest::post("/contas").json(account)?).await?;
        info!(bank = %account.banco_nome, "Account created");
        Ok(())
    }

    pub async fn delete_account(&self, account_id: &str) -> Result<(), ApiError> {
        self.delete(&format!("/contas/{}", account_id)).await?;
        info!(account_id, "Account deleted");
        Ok(())
    }

    // ===== Transactions =====

    async fn fetch_recent(
        &self,
        kind: TransactionKind,
        user_id: &UserId,
    ) -> Result<Vec<Transaction>, ApiError> {
        let path = format!("/{}/ultimas/{}", kind.resource(), user_id);
        let items: Vec<Transaction> = self.fetch_data(ApiRequest::get(path)).await?;
        debug!(kind = kind.resource(), count = items.len(), "Fetched recent transactions");
        Ok(items.into_iter().map(|t| t.with_kind(kind)).collect())
    }

    pub async fn fetch_recent_expenses(&self, user_id: &UserId) -> Result<Vec<Transaction>, ApiError> {
        self.fetch_recent(TransactionKind::Expense, user_id).await
    }

    pub async fn fetch_recent_incomes(&self, user_id: &UserId) -> Result<Vec<Transaction>, ApiError> {
        self.fetch_recent(TransactionKind::Income, user_id).await
    }

    /// Total for a month; the current month when `month` is `None`.
    pub async fn fetch_monthly_total(
        &self,
        kind: TransactionKind,
        user_id: &UserId,
        month: Option<YearMonth>,
    ) -> Result<f64, ApiError> {
        let mut request = ApiRequest::get(format!("/{}/total-mes/{}", kind.resource(), user_id));
        if let Some(month) = month {
            request = request.query("ano", month.year).query("mes", month.month);
        }
        let response: TotalResponse = self.fetch(request).await?;
        Ok(response.total)
    }

    pub async fn create_expense(&self, expense: &NewExpense) -> Result<(), ApiError> {
        self.create(ApiRequest::post("/despesas").json(expense)?).await?;
        info!(valor = expense.valor, "Expense recorded");
        Ok(())
    }

    pub async fn create_income(&self, income: &NewIncome) -> Result<(), ApiError> {
        self.create(ApiRequest::post("/receitas").json(income)?).await?;
        info!(valor = income.quantidade, "Income recorded");
        Ok(())
    }

    pub async fn delete_transaction(&self, kind: TransactionKind, id: &str) -> Result<(), ApiError> {
        self.delete(&format!("/{}/{}", kind.resource(), id)).await?;
        info!(kind = kind.resource(), id, "Transaction deleted");
        Ok(())
    }

    // ===== Categories =====

    pub async fn fetch_categories(&self) -> Result<Vec<Category>, ApiError> {
        self.fetch_data(ApiRequest::get("/categorias")).await
    }

    // ===== Cards and invoices =====

    pub async fn fetch_cards(&self) -> Result<Vec<Card>, ApiError> {
        self.fetch_data(ApiRequest::get("/cartoes")).await
    }

    pub async fn create_card(&self, card: &NewCard) -> Result<(), ApiError> {
        card.validate().map_err(ApiError::BadRequest)?;
        self.create(ApiRequest::post("/cartoes").json(card)?).await?;
        info!(nome = %card.nome, "Card created");
        Ok(())
    }

    pub async fn fetch_card_summary(&self, card_id: &str) -> Result<CardSummary, ApiError> {
        self.fetch_data(ApiRequest::get(format!("/cartoes/{}/resumo", card_id)))
            .await
    }

    /// The open invoice for a card, or `None` when the card has none yet.
    pub async fn fetch_current_invoice(&self, card_id: &str) -> Result<Option<InvoiceDetail>, ApiError> {
        match self
            .fetch_data(ApiRequest::get(format!("/faturas/cartao/{}/atual", card_id)))
            .await
        {
            Ok(detail) => Ok(detail),
            Err(ApiError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    // ===== Profile =====

    pub async fn update_profile(&self, user_id: &UserId, update: &ProfileUpdate) -> Result<(), ApiError> {
        self.send(&ApiRequest::put(format!("/usuarios/{}", user_id)).json(update)?)
            .await?;

        // Keep the stored profile in step with what the server accepted
        if let Some(mut profile) = self.store().user_profile()? {
            if let (Value::Object(map), Value::Object(changes)) =
                (&mut profile, serde_json::to_value(update).unwrap_or(Value::Null))
            {
                map.extend(changes);
            }
            if let Some(token) = self.store().access_token()? {
                self.store().save(&token, None, Some(&profile))?;
            }
        }
        info!(user = %user_id, "Profile updated");
        Ok(())
    }
}
