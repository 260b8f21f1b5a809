//! Account statement of one student

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use super::student::Student;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StatementLineKind {
    Deposit,
    Loan,
}

impl StatementLineKind {
    pub fn label(&self) -> &'static str {
        match self {
            StatementLineKind::Deposit => "Deposit",
            StatementLineKind::Loan => "Loan",
        }
    }
}

/// One movement; exactly one of `debit` / `credit` is set
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StatementLine {
    pub date: DateTime<Utc>,
    pub kind: StatementLineKind,
    pub description: String,
    pub debit: Option<Decimal>,
    pub credit: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Statement {
    pub student: Student,
    /// Deposits and loans, oldest first
    pub lines: Vec<StatementLine>,
    pub total_debits: Decimal,
    pub total_credits: Decimal,
}

impl Statement {
    /// Plain-text rendering used as the e-mail fallback body
    pub fn to_text(&self) -> String {
        let mut out = format!("Statement for {}\n\n", self.student.name);
        for line in &self.lines {
            let (sign, amount) = match (line.debit, line.credit) {
                (Some(debit), _) => ("-", debit),
                (None, Some(credit)) => ("+", credit),
                (None, None) => (" ", Decimal::ZERO),
            };
            out.push_str(&format!(
                "{}  {:<8} {:<40} {}{:.2}\n",
                line.date.format("%d/%m/%Y %H:%M"),
                line.kind.label(),
                line.description,
                sign,
                amount
            ));
        }
        out.push_str(&format!(
            "\nTotal debits: {:.2}\nTotal credits: {:.2}\nCurrent balance: {:.2}\n",
            self.total_debits, self.total_credits, self.student.balance
        ));
        out
    }

    /// HTML table with date, type, description, debit and credit columns
    pub fn to_html(&self, title: &str) -> String {
        let mut html = format!(
            r#"<html>
<body style="font-family: Helvetica, Arial, sans-serif;">
<h2>{title}</h2>
<h3>Student: {name} ({class})</h3>
<table border="1" cellpadding="4" style="border-collapse: collapse;">
<thead style="background-color: rgb(195, 191, 191);">
<tr><th>Date</th><th>Type</th><th>Description</th><th>Debit</th><th>Credit</th></tr>
</thead>
<tbody>
"#,
            title = escape(title),
            name = escape(&self.student.name),
            class = escape(&self.student.class_name),
        );

        for line in &self.lines {
            html.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td style=\"text-align: right;\">{}</td><td style=\"text-align: right;\">{}</td></tr>\n",
                line.date.format("%d/%m/%Y %H:%M"),
                line.kind.label(),
                escape(&line.description),
                line.debit.map(|d| format!("{:.2}", d)).unwrap_or_default(),
                line.credit.map(|c| format!("{:.2}", c)).unwrap_or_default(),
            ));
        }

        html.push_str(&format!(
            r#"<tr style="font-weight: bold; background-color: rgb(235, 232, 232);">
<td colspan="3" style="text-align: right;">Totals:</td>
<td style="text-align: right;">{:.2}</td><td style="text-align: right;">{:.2}</td></tr>
<tr style="font-weight: bold;">
<td colspan="3" style="text-align: right;">Current balance:</td>
<td colspan="2" style="text-align: right;">{:.2}</td></tr>
</tbody>
</table>
</body>
</html>
"#,
            self.total_debits, self.total_credits, self.student.balance
        ));

        html
    }
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
