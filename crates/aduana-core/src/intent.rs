//! Keyword-signal intent detection.
//!
//! Domain and kind detection run over the raw user message as an ordered
//! table of `(signals, exclusions, outcome)` rules evaluated once. A rule
//! fires when any signal is contained in the lowercased message and no
//! exclusion is. Order encodes precedence: exclusion-style rules come
//! first, the first firing rule wins.
//!
//! The chat surface is bilingual, so signal vocabularies carry both
//! Portuguese and English forms.

use crate::report::{Domain, ReportKind};

struct SignalRule<T> {
    signals: &'static [&'static str],
    exclusions: &'static [&'static str],
    outcome: T,
}

impl<T: Clone> SignalRule<T> {
    fn fire(&self, message: &str) -> Option<T> {
        if self.exclusions.iter().any(|e| message.contains(e)) {
            return None;
        }
        if self.signals.iter().any(|s| message.contains(s)) {
            return Some(self.outcome.clone());
        }
        None
    }
}

/// Explicit customs-document wording. Forces the processes domain even when
/// banking words ("statement", "extrato") appear in the same message.
const DECLARATION_SIGNALS: &[&str] = &[
    "statement of a customs declaration",
    "statement of the customs declaration",
    "customs declaration",
    "declaration statement",
    "extrato da declaracao",
    "extrato da declaração",
    "extrato da di",
    "declaracao de importacao",
    "declaração de importação",
];

const FINANCE_SIGNALS: &[&str] = &[
    "bank",
    "banco",
    "balance",
    "saldo",
    "transfer",
    "transferencia",
    "transferência",
    "account",
    "conta corrente",
    "statement",
    "extrato",
    "pix",
    "cash flow",
    "fluxo de caixa",
];

const SALES_SIGNALS: &[&str] = &[
    "invoice",
    "sale",
    "sales",
    "revenue",
    "billing",
    "venda",
    "vendas",
    "faturamento",
    "nota fiscal",
];

const DOMAIN_RULES: &[SignalRule<Domain>] = &[
    SignalRule {
        signals: DECLARATION_SIGNALS,
        exclusions: &[],
        outcome: Domain::Processes,
    },
    SignalRule {
        signals: FINANCE_SIGNALS,
        exclusions: DECLARATION_SIGNALS,
        outcome: Domain::Finance,
    },
    SignalRule {
        signals: SALES_SIGNALS,
        exclusions: &[],
        outcome: Domain::Sales,
    },
];

/// Classifies the domain a user message refers to.
///
/// Pure and order-sensitive: document wording wins over banking wording,
/// banking over sales, and everything else falls back to `processes`.
pub fn detect_domain(message: &str) -> Domain {
    let message = message.to_lowercase();
    DOMAIN_RULES
        .iter()
        .find_map(|rule| rule.fire(&message))
        .unwrap_or(Domain::Processes)
}

const KIND_RULES: &[SignalRule<ReportKind>] = &[
    SignalRule {
        signals: &["closing", "fechamento", "close of day"],
        exclusions: &[],
        outcome: ReportKind::DayClosing,
    },
    SignalRule {
        signals: &[
            "dashboard",
            "panorama",
            "daily report",
            "relatorio do dia",
            "relatório do dia",
            "today",
            "hoje",
        ],
        exclusions: &["closing", "fechamento"],
        outcome: ReportKind::DailyDashboard,
    },
    SignalRule {
        signals: &["abc", "pareto", "curva abc"],
        exclusions: &[],
        outcome: ReportKind::SalesAbc,
    },
    SignalRule {
        signals: &[
            "sales by invoice",
            "by invoice",
            "invoice report",
            "sales report",
            "relatorio de vendas",
            "relatório de vendas",
            "faturamento por nota",
        ],
        exclusions: &[],
        outcome: ReportKind::SalesByInvoice,
    },
    SignalRule {
        signals: &[
            "legislation",
            "legislacao",
            "legislação",
            "regulation",
            "norma",
        ],
        exclusions: &[],
        outcome: ReportKind::LegislationLookup,
    },
];

/// Detects an explicitly named report kind in a user message, if any.
///
/// Used by the pick procedure: an explicit mention always wins over the
/// domain's implicit active pointer.
pub fn detect_kind(message: &str) -> Option<ReportKind> {
    let message = message.to_lowercase();
    KIND_RULES.iter().find_map(|rule| rule.fire(&message))
}

const KIND_DOMAIN_RULES: &[SignalRule<Domain>] = &[
    SignalRule {
        signals: &["closing", "financ", "bank", "statement", "caixa"],
        exclusions: &[],
        outcome: Domain::Finance,
    },
    SignalRule {
        signals: &["sales", "invoice", "revenue", "billing", "faturamento"],
        exclusions: &[],
        outcome: Domain::Sales,
    },
];

/// Infers the pointer domain a report kind belongs to.
pub fn domain_for_kind(kind: &ReportKind) -> Domain {
    let kind = kind.to_string().to_lowercase();
    KIND_DOMAIN_RULES
        .iter()
        .find_map(|rule| rule.fire(&kind))
        .unwrap_or(Domain::Processes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_wording_forces_processes() {
        // "statement" and "extrato" are banking words, but the customs
        // document wording must win
        assert_eq!(
            detect_domain("send me the statement of a customs declaration"),
            Domain::Processes
        );
        assert_eq!(
            detect_domain("quero o extrato da declaração de hoje"),
            Domain::Processes
        );
    }

    #[test]
    fn test_banking_words_select_finance() {
        assert_eq!(detect_domain("what's the bank balance?"), Domain::Finance);
        assert_eq!(detect_domain("saldo da conta corrente"), Domain::Finance);
    }

    #[test]
    fn test_sales_words_select_sales() {
        assert_eq!(detect_domain("revenue by invoice please"), Domain::Sales);
        assert_eq!(detect_domain("faturamento de julho"), Domain::Sales);
    }

    #[test]
    fn test_default_is_processes() {
        assert_eq!(detect_domain("how are my processes doing?"), Domain::Processes);
        assert_eq!(detect_domain(""), Domain::Processes);
    }

    #[test]
    fn test_closing_wins_over_today() {
        assert_eq!(
            detect_kind("send today's closing report"),
            Some(ReportKind::DayClosing)
        );
        assert_eq!(
            detect_kind("show me today's numbers"),
            Some(ReportKind::DailyDashboard)
        );
    }

    #[test]
    fn test_no_explicit_kind() {
        assert_eq!(detect_kind("filter the green ones"), None);
    }

    #[test]
    fn test_domain_for_kind() {
        assert_eq!(domain_for_kind(&ReportKind::DayClosing), Domain::Finance);
        assert_eq!(domain_for_kind(&ReportKind::SalesByInvoice), Domain::Sales);
        assert_eq!(domain_for_kind(&ReportKind::SalesAbc), Domain::Sales);
        assert_eq!(
            domain_for_kind(&ReportKind::DailyDashboard),
            Domain::Processes
        );
        assert_eq!(
            domain_for_kind(&ReportKind::Other("bank_reconciliation".into())),
            Domain::Finance
        );
    }
}
