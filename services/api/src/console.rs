use crate::cli::ListArgs;
use crate::infra::open_store;
use chrono::Utc;
use refund_desk::config::{AppConfig, StorageConfig};
use refund_desk::error::AppError;
use refund_desk::refunds::{ListQuery, OperatorConsole, RequestId};

fn console() -> Result<OperatorConsole<crate::infra::SharedRepository>, AppError> {
    let config = AppConfig::load()?;
    if matches!(config.storage, StorageConfig::Memory) {
        eprintln!("REFUND_STORE_PATH is not set; reading an empty in-memory store");
    }
    Ok(OperatorConsole::new(open_store(&config.storage)?))
}

pub(crate) fn list_requests(args: ListArgs) -> Result<(), AppError> {
    let query = ListQuery {
        processed: args.processed,
        bank_name: args.bank,
        created: args.created,
        search: args.search,
    };
    let rows = console()?.rows(&query, Utc::now())?;

    if rows.is_empty() {
        println!("No refund requests yet.");
        return Ok(());
    }

    println!("Refund requests ({})", rows.len());
    for row in rows {
        println!(
            "- {} | {} | ${} | {} | {} | {} | {}",
            row.short_id,
            row.recipient_name,
            row.refund_amount,
            row.bank_name,
            row.masked_card,
            row.status,
            row.created_at.format("%Y-%m-%d %H:%M"),
        );
    }
    Ok(())
}

pub(crate) fn show_request(id: RequestId) -> Result<(), AppError> {
    let Some(detail) = console()?.detail(&id)? else {
        println!("Refund request {id} not found");
        return Ok(());
    };

    println!("Refund request {}", detail.request_id);
    println!("  Recipient:      {}", detail.recipient_name);
    println!("  Amount:         ${}", detail.refund_amount);
    println!("  Bank:           {}", detail.bank_name);
    println!("  Account number: {}", detail.masked_account_number);
    println!("  Card number:    {}", detail.masked_card_number);
    println!("  Expiry date:    {}", detail.expiry_date);
    match detail.processed_at {
        Some(at) => println!("  Status:         Processed ({})", at.to_rfc3339()),
        None => println!("  Status:         Pending"),
    }
    println!("  Submitted at:   {}", detail.created_at.to_rfc3339());
    println!("  Updated at:     {}", detail.updated_at.to_rfc3339());
    println!(
        "  IP address:     {}",
        detail.ip_address.as_deref().unwrap_or("-")
    );
    println!(
        "  User agent:     {}",
        detail.user_agent.as_deref().unwrap_or("-")
    );
    Ok(())
}

pub(crate) fn mark_requests_processed(ids: &[RequestId]) -> Result<(), AppError> {
    let report = console()?.mark_processed(ids)?;
    println!("{}", report.message);
    Ok(())
}
