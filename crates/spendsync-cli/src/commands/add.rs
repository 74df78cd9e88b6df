use spendsync_core::{ExpenseDraft, RecordedExpense};

use crate::commands::common::{
    open_engine, parse_amount, parse_category_id, parse_expense_date, today, AppPaths,
};
use crate::error::CliError;

pub async fn run_add(
    name: &str,
    amount: &str,
    category: &str,
    date: Option<&str>,
    public: bool,
    paths: &AppPaths,
) -> Result<(), CliError> {
    let draft = ExpenseDraft::new(
        name.trim(),
        parse_amount(amount)?,
        parse_category_id(category)?,
        parse_expense_date(date, today())?,
    )
    .public(public);

    let engine = open_engine(paths).await?;
    match engine.record_expense(draft).await? {
        RecordedExpense::Pending(pending) => {
            println!("Saved offline as {} (will sync later)", pending.local_id);
        }
        RecordedExpense::Confirmed(expense) => println!("{}", expense.id),
    }
    Ok(())
}
