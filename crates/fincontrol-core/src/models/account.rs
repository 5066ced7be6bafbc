use serde::{Deserialize, Serialize};

use super::de::{deserialize_amount, deserialize_id};

/// Bank account owned by the user
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub banco_nome: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub agencia: Option<String>,
    #[serde(default)]
    pub conta: Option<String>,
    #[serde(default, deserialize_with = "deserialize_amount")]
    pub saldo: f64,
    #[serde(default, deserialize_with = "deserialize_amount")]
    pub cdi_percent: f64,
    #[serde(default)]
    pub efetivo: Option<bool>,
    #[serde(default)]
    pub cartoes: Vec<CardRef>,
}

impl Account {
    /// "Bank - number", as listed on the dashboard
    pub fn display_name(&self) -> String {
        match (&self.banco_nome, &self.conta) {
            (Some(bank), Some(number)) => format!("{} - {}", bank, number),
            (Some(bank), None) => bank.clone(),
            (None, Some(number)) => number.clone(),
            (None, None) => self.id.clone(),
        }
    }

    /// Sum of balances across accounts
    pub fn total_balance(accounts: &[Account]) -> f64 {
        accounts.iter().map(|a| a.saldo).sum()
    }
}

/// Card reference embedded in an account listing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct CardRef {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub nome: Option<String>,
}

/// Body of `POST /contas`
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct NewAccount {
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub banco_nome: String,
    pub agencia: String,
    pub conta: String,
    pub saldo: f64,
    pub efetivo: bool,
    pub cdi_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "UPPERCASE")]
pub enum CardKind {
    Credito,
    Debito,
    Misto,
}

impl CardKind {
    /// Credit and mixed cards have a billing cycle
    pub fn has_billing_cycle(&self) -> bool {
        matches!(self, CardKind::Credito | CardKind::Misto)
    }
}

/// Card as returned by `GET /cartoes`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Card {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub nome: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "deserialize_amount")]
    pub credit_limit: f64,
    #[serde(default)]
    pub closing_day: Option<u8>,
    #[serde(default)]
    pub due_day: Option<u8>,
}

/// Body of `POST /cartoes`
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct NewCard {
    pub conta_id: String,
    pub nome: String,
    #[serde(rename = "type")]
    pub kind: CardKind,
    pub credit_limit: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closing_day: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_day: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icone: Option<String>,
}

/// Billing days must fall in 1..=28 so every month has them
pub const MAX_BILLING_DAY: u8 = 28;

impl NewCard {
    /// Check the billing cycle fields for credit/mixed cards.
    /// Returns a user-facing message on failure.
    pub fn validate(&self) -> Result<(), String> {
        if self.nome.trim().is_empty() {
            return Err("Card name is required".to_string());
        }
        if self.kind.has_billing_cycle() {
            for (label, day) in [("closing", self.closing_day), ("due", self.due_day)] {
                match day {
                    Some(d) if (1..=MAX_BILLING_DAY).contains(&d) => {}
                    _ => {
                        return Err(format!(
                            "Enter a valid {} day (1-{})",
                            label, MAX_BILLING_DAY
                        ))
                    }
                }
            }
        }
        Ok(())
    }
}

/// Account details embedded in a card summary
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct CardAccount {
    #[serde(default)]
    pub conta: Option<String>,
    #[serde(default)]
    pub banco_nome: Option<String>,
    #[serde(default)]
    pub agencia: Option<String>,
    #[serde(default)]
    pub saldo: Option<f64>,
}

/// Response of `GET /cartoes/{id}/resumo`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct CardSummary {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub nome: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "deserialize_amount")]
    pub credit_limit: f64,
    #[serde(default, deserialize_with = "deserialize_amount")]
    pub credit_used: f64,
    #[serde(default, deserialize_with = "deserialize_amount")]
    pub available: f64,
    #[serde(default, deserialize_with = "deserialize_amount")]
    pub percent_used: f64,
    #[serde(default)]
    pub conta: Option<CardAccount>,
}

/// Purchase an installment belongs to
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct InstallmentPurchase {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub descricao: Option<String>,
    #[serde(default, deserialize_with = "deserialize_amount")]
    pub valor: f64,
    #[serde(default)]
    pub metodo_pagamento: Option<String>,
    #[serde(default)]
    pub data: Option<String>,
}

/// One installment billed on an invoice
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Installment {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub numero_parcela: u32,
    #[serde(default, deserialize_with = "deserialize_amount")]
    pub valor: f64,
    #[serde(default)]
    pub data_vencimento: Option<String>,
    #[serde(default)]
    pub paga: bool,
    #[serde(default)]
    pub data_pagamento: Option<String>,
    #[serde(default)]
    pub despesa: Option<InstallmentPurchase>,
}

/// Credit card invoice for one month
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(deserialize_with = "deserialize_id")]
    pub cartao_id: String,
    pub mes: u32,
    pub ano: i32,
    #[serde(default, deserialize_with = "deserialize_amount")]
    pub valor_total: f64,
    #[serde(default, deserialize_with = "deserialize_amount")]
    pub valor_pago: f64,
    #[serde(default)]
    pub paga: bool,
    #[serde(default)]
    pub parcelas: Vec<Installment>,
}

/// Payment progress attached to an invoice
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct InvoiceProgress {
    #[serde(default, deserialize_with = "deserialize_amount")]
    pub restante: f64,
    #[serde(default, deserialize_with = "deserialize_amount")]
    pub percent_pago: f64,
}

/// Response of `GET /faturas/cartao/{id}/atual`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct InvoiceDetail {
    pub fatura: Invoice,
    pub resumo: InvoiceProgress,
}
