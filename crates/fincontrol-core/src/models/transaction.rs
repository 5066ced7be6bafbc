use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::de::{deserialize_amount, deserialize_id};

/// Income or expense
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum TransactionKind {
    #[serde(rename = "Receita", alias = "RECEITA")]
    Income,
    #[serde(rename = "Despesa", alias = "DESPESA")]
    Expense,
}

impl TransactionKind {
    /// API collection the kind lives under
    pub fn resource(&self) -> &'static str {
        match self {
            TransactionKind::Income => "receitas",
            TransactionKind::Expense => "despesas",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentMethod {
    Pix,
    Credito,
    Debito,
    Dinheiro,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct NamedRef {
    #[serde(default, alias = "nome")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct AccountRef {
    #[serde(default)]
    pub banco_nome: Option<String>,
}

/// A money movement as listed by the "latest" and "current month" endpoints.
///
/// The kind is not part of the payload; it is set from the endpoint queried.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default, rename = "tipo")]
    pub kind: Option<TransactionKind>,
    #[serde(default, alias = "description")]
    pub descricao: String,
    #[serde(default, alias = "quantidade", deserialize_with = "deserialize_amount")]
    pub valor: f64,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub metodo_pagamento: Option<String>,
    #[serde(default, alias = "contas")]
    pub conta: Option<AccountRef>,
    #[serde(default)]
    pub categoria: Option<NamedRef>,
    #[serde(default)]
    pub cartao: Option<NamedRef>,
}

impl Transaction {
    pub fn with_kind(mut self, kind: TransactionKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Amount with the sign of its direction: expenses are negative
    pub fn signed_amount(&self) -> f64 {
        match self.kind {
            Some(TransactionKind::Expense) => -self.valor.abs(),
            _ => self.valor,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Category {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(alias = "nome")]
    pub name: String,
    #[serde(default)]
    pub tipo: Option<String>,
}

impl Category {
    pub fn applies_to(&self, kind: TransactionKind) -> bool {
        match self.tipo.as_deref().map(str::to_ascii_uppercase).as_deref() {
            Some("RECEITA") => kind == TransactionKind::Income,
            Some("DESPESA") => kind == TransactionKind::Expense,
            _ => true,
        }
    }
}

/// Body of `POST /despesas`
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct NewExpense {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conta_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cartao_id: Option<String>,
    pub category_id: String,
    pub descricao: String,
    pub valor: f64,
    pub metodo_pagamento: PaymentMethod,
    /// YYYY-MM-DD
    pub data: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parcelado: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numero_parcelas: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub juros: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observacoes: Option<String>,
}

/// Body of `POST /receitas`
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct NewIncome {
    pub user_id: String,
    pub account_id: String,
    pub category_id: String,
    pub description: String,
    pub quantidade: f64,
    /// YYYY-MM-DD
    pub data: String,
}

/// Calendar month used by the monthly totals endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct YearMonth {
    pub year: i32,
    /// 1-12
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn current() -> Self {
        Self::of(chrono::Local::now().date_naive())
    }

    pub fn previous(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_year_month_previous_wraps() {
        let jan = YearMonth::new(2025, 1).unwrap();
        assert_eq!(jan.previous(), YearMonth::new(2024, 12).unwrap());
        let jul = YearMonth::new(2025, 7).unwrap();
        assert_eq!(jul.previous(), YearMonth::new(2025, 6).unwrap());
    }

    #[test]
    fn test_year_month_rejects_bad_month() {
        assert!(YearMonth::new(2025, 0).is_none());
        assert!(YearMonth::new(2025, 13).is_none());
    }

    #[test]
    fn test_year_month_of_date() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(YearMonth::of(date), YearMonth { year: 2024, month: 2 });
    }

    #[test]
    fn test_transaction_from_api() {
        let tx: Transaction = serde_json::from_value(json!({
            "id": 10,
            "descricao": "Mercado",
            "valor": "230.40",
            "data": "2025-03-02",
            "metodoPagamento": "PIX",
            "conta": {"bancoNome": "Itau"},
            "categoria": {"name": "Alimentação"}
        }))
        .unwrap();
        let tx = tx.with_kind(TransactionKind::Expense);
        assert_eq!(tx.id, "10");
        assert_eq!(tx.signed_amount(), -230.4);
        assert_eq!(tx.conta.unwrap().banco_nome.as_deref(), Some("Itau"));
    }

    #[test]
    fn test_transaction_kind_names() {
        assert_eq!(
            serde_json::to_value(TransactionKind::Income).unwrap(),
            json!("Receita")
        );
        let kind: TransactionKind = serde_json::from_value(json!("DESPESA")).unwrap();
        assert_eq!(kind, TransactionKind::Expense);
        assert_eq!(TransactionKind::Expense.resource(), "despesas");
    }

    #[test]
    fn test_category_applies_to() {
        let income: Category =
            serde_json::from_value(json!({"id": "1", "name": "Salário", "tipo": "RECEITA"})).unwrap();
        assert!(income.applies_to(TransactionKind::Income));
        assert!(!income.applies_to(TransactionKind::Expense));

        let any: Category = serde_json::from_value(json!({"id": "2", "nome": "Outros"})).unwrap();
        assert!(any.applies_to(TransactionKind::Expense));
    }

    #[test]
    fn test_new_expense_serialization() {
        let expense = NewExpense {
            user_id: "u1".to_string(),
            conta_id: Some("c1".to_string()),
            cartao_id: None,
            category_id: "cat".to_string(),
            descricao: "Luz".to_string(),
            valor: 120.0,
            metodo_pagamento: PaymentMethod::Pix,
            data: "2025-03-05".to_string(),
            parcelado: None,
            numero_parcelas: None,
            juros: None,
            observacoes: None,
        };
        assert_eq!(
            serde_json::to_value(&expense).unwrap(),
            json!({
                "userId": "u1",
                "contaId": "c1",
                "categoryId": "cat",
                "descricao": "Luz",
                "valor": 120.0,
                "metodoPagamento": "PIX",
                "data": "2025-03-05"
            })
        );
    }
}
