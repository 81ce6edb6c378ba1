mod common;

use anyhow::Result;
use cafe_ledger::application::AppError;
use common::{at, parse_date, test_service, today, Regulars};

#[tokio::test]
async fn test_today_summary_for_fresh_customer() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let customer = service.create_customer("Asha", None).await?;

    service
        .record_transaction(customer.id, 10000, "Breakfast", "credit")
        .await?;
    service
        .record_transaction(customer.id, 3000, "Paid cash", "debit")
        .await?;

    let summary = service.range_summary(customer.id, None, None).await?;
    assert_eq!(summary.start_date, today());
    assert_eq!(summary.end_date, today());
    assert_eq!(summary.opening, 0);
    assert_eq!(summary.closing, 7000);
    assert_eq!(summary.net_change(), Some(7000));
    assert_eq!(summary.transactions.len(), 2);
    assert_eq!(summary.transactions[0].description, "Breakfast");

    Ok(())
}

#[tokio::test]
async fn test_range_summary_opening_and_closing() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let customer = service.create_customer("Asha", None).await?;

    let entries = [
        ("2024-04-01", 4000, "credit"),
        ("2024-04-02", 1500, "debit"),
        ("2024-04-03", 2500, "credit"),
        ("2024-04-05", 500, "debit"),
    ];
    for (date, amount, kind) in entries {
        service
            .record_transaction_at(customer.id, amount, "Order", kind, at(date, 10))
            .await?;
    }

    let summary = service
        .range_summary(
            customer.id,
            Some(parse_date("2024-04-02")),
            Some(parse_date("2024-04-03")),
        )
        .await?;
    assert_eq!(summary.opening, 4000);
    assert_eq!(summary.closing, 5000);
    assert_eq!(summary.transactions.len(), 2);

    // Entries after the range never leak into the closing balance
    let cached = service.get_customer(customer.id).await?.credit;
    assert_eq!(cached, 4500);
    assert_ne!(summary.closing, cached);

    Ok(())
}

#[tokio::test]
async fn test_ranges_chain_together() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let customer = service.create_customer("Asha", None).await?;

    let entries = [
        ("2024-06-01", 1200, "credit"),
        ("2024-06-03", 700, "debit"),
        ("2024-06-04", 300, "credit"),
        ("2024-06-07", 2000, "credit"),
        ("2024-06-09", 900, "debit"),
    ];
    for (date, amount, kind) in entries {
        service
            .record_transaction_at(customer.id, amount, "Order", kind, at(date, 18))
            .await?;
    }

    let first = service
        .range_summary(
            customer.id,
            Some(parse_date("2024-06-01")),
            Some(parse_date("2024-06-04")),
        )
        .await?;
    let second = service
        .range_summary(
            customer.id,
            Some(parse_date("2024-06-05")),
            Some(parse_date("2024-06-09")),
        )
        .await?;
    let whole = service
        .range_summary(
            customer.id,
            Some(parse_date("2024-06-01")),
            Some(parse_date("2024-06-09")),
        )
        .await?;

    assert_eq!(first.closing, second.opening);
    assert_eq!(whole.opening, first.opening);
    assert_eq!(whole.closing, second.closing);
    assert_eq!(
        whole.transactions.len(),
        first.transactions.len() + second.transactions.len()
    );

    // Point-in-time balance agrees with the summary boundaries
    assert_eq!(
        service
            .point_in_time_balance(customer.id, parse_date("2024-06-05"))
            .await?,
        second.opening
    );

    Ok(())
}

#[tokio::test]
async fn test_range_without_activity() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let customer = service.create_customer("Asha", None).await?;
    service
        .record_transaction_at(customer.id, 900, "Tea", "credit", at("2024-01-10", 9))
        .await?;

    let summary = service
        .range_summary(
            customer.id,
            Some(parse_date("2024-02-01")),
            Some(parse_date("2024-02-29")),
        )
        .await?;
    assert_eq!(summary.opening, 900);
    assert_eq!(summary.closing, 900);
    assert!(summary.transactions.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_single_day_includes_late_evening() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let customer = service.create_customer("Asha", None).await?;
    let day = parse_date("2024-08-15");

    let late = day.and_hms_opt(23, 59, 59).unwrap().and_utc();
    service
        .record_transaction_at(customer.id, 450, "Late coffee", "credit", late)
        .await?;
    service
        .record_transaction_at(customer.id, 100, "Next morning", "credit", at("2024-08-16", 0))
        .await?;

    let summary = service.range_summary(customer.id, Some(day), Some(day)).await?;
    assert_eq!(summary.transactions.len(), 1);
    assert_eq!(summary.closing, 450);

    Ok(())
}

#[tokio::test]
async fn test_inverted_range_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let customer = service.create_customer("Asha", None).await?;

    let err = service
        .range_summary(
            customer.id,
            Some(parse_date("2024-05-10")),
            Some(parse_date("2024-05-01")),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidArgument(_)));

    let err = service
        .global_daily_summary(Some(parse_date("2024-05-10")), Some(parse_date("2024-05-01")))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidArgument(_)));

    Ok(())
}

#[tokio::test]
async fn test_range_summary_unknown_customer() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let err = service
        .range_summary(uuid::Uuid::new_v4(), None, None)
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    Ok(())
}

#[tokio::test]
async fn test_global_summary_today() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let a = service.create_customer("A", None).await?;
    let b = service.create_customer("B", None).await?;

    service.record_transaction(a.id, 5000, "Thali", "credit").await?;
    service.record_transaction(b.id, 2000, "Advance", "debit").await?;

    let summary = service.global_daily_summary(None, None).await?;
    assert_eq!(summary.start_date, today());
    assert_eq!(summary.transactions.len(), 2);
    assert_eq!(summary.total_credits_now, 3000);
    assert_eq!(service.total_credits().await?, 3000);

    Ok(())
}

#[tokio::test]
async fn test_global_summary_range_across_customers() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let regulars = Regulars::create(&service).await?;

    service
        .record_transaction_at(regulars.asha.id, 1000, "Tea", "credit", at("2024-07-01", 8))
        .await?;
    service
        .record_transaction_at(regulars.ravi.id, 2000, "Lunch", "credit", at("2024-07-02", 13))
        .await?;
    service
        .record_transaction_at(regulars.meera.id, 300, "Paid", "debit", at("2024-07-02", 9))
        .await?;
    service
        .record_transaction_at(regulars.asha.id, 500, "Paid", "debit", at("2024-07-03", 8))
        .await?;

    let summary = service
        .global_daily_summary(Some(parse_date("2024-07-02")), Some(parse_date("2024-07-02")))
        .await?;
    let descriptions: Vec<&str> = summary
        .transactions
        .iter()
        .map(|tx| tx.description.as_str())
        .collect();
    assert_eq!(descriptions, ["Paid", "Lunch"]);

    // The total is "now", not as of the range end
    assert_eq!(summary.total_credits_now, 2200);

    Ok(())
}

#[tokio::test]
async fn test_summary_serializes_to_json() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let customer = service.create_customer("Asha", None).await?;
    service
        .record_transaction_at(customer.id, 1250, "Cutlet", "credit", at("2024-09-09", 11))
        .await?;

    let day = parse_date("2024-09-09");
    let summary = service.range_summary(customer.id, Some(day), Some(day)).await?;
    let json = serde_json::to_value(&summary)?;

    assert_eq!(json["opening"], 0);
    assert_eq!(json["closing"], 1250);
    assert_eq!(json["transactions"][0]["kind"], "credit");

    Ok(())
}

#[tokio::test]
async fn test_global_total_tracks_only_active_customer() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let a = service.create_customer("A", None).await?;
    let b = service.create_customer("B", None).await?;

    service.record_transaction(a.id, 4200, "Thali", "credit").await?;
    service.record_transaction(a.id, 1200, "Paid", "debit").await?;

    let summary = service.global_daily_summary(None, None).await?;
    let a_balance = service.get_customer(a.id).await?.credit;
    assert_eq!(summary.total_credits_now, a_balance);
    assert_eq!(service.get_customer(b.id).await?.credit, 0);
    assert!(summary.transactions.iter().all(|tx| tx.customer_id == a.id));

    Ok(())
}
