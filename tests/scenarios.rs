use invest_desk::config::PlatformPolicy;
use invest_desk::db::{ keys, NewVerification, RecordStore, SledStorage, UserRecord };
use invest_desk::enums::{ DocumentType, ReviewStatus, Sender, TxType };
use invest_desk::services::RegistrationForm;
use invest_desk::{ AppError, Platform };
use rust_decimal::Decimal;
use std::sync::Arc;

fn platform() -> Platform {
    Platform::new(RecordStore::in_memory(), PlatformPolicy {
        seed_sample_ledger: false,
        auto_approve_verifications: false,
        ..PlatformPolicy::default()
    })
}

fn alice() -> RegistrationForm {
    RegistrationForm {
        first_name: "Alice".to_string(),
        last_name: "Martin".to_string(),
        email: "alice@example.com".to_string(),
        phone: "+33 6 12 34 56 78".to_string(),
        country: "FR".to_string(),
        password: "Passw0rd!".to_string(),
        confirm_password: "Passw0rd!".to_string(),
        accept_terms: true,
    }
}

#[tokio::test]
async fn register_then_login_returns_same_account() {
    let p = platform();

    let registered = p.users.register(alice()).await.unwrap();
    assert_eq!(registered.balance, PlatformPolicy::default().starter_balance);

    p.users.logout().unwrap();
    let logged_in = p.users.login("alice@example.com", "Passw0rd!").await.unwrap();
    assert_eq!(logged_in.uid, registered.uid);
}

#[tokio::test]
async fn duplicate_registration_is_rejected() {
    let p = platform();
    p.users.register(alice()).await.unwrap();

    let err = p.users.register(alice()).await.unwrap_err();
    assert!(matches!(err, AppError::DuplicateEmail(_)));
    assert_eq!(p.store.all::<UserRecord>(keys::REGISTERED_USERS).len(), 1);
}

#[tokio::test]
async fn unknown_email_cannot_login() {
    let p = platform();
    assert!(matches!(p.users.login("bob@example.com", "x").await, Err(AppError::UserNotFound)));
}

#[tokio::test]
async fn profit_is_recorded_as_earnings() {
    let p = platform();
    let registered = p.users.register(alice()).await.unwrap();

    p.ledger.add_profit("alice@example.com", Decimal::from(500)).await.unwrap();

    let earnings: Vec<_> = p.ledger
        .list_transactions(&registered.uid)
        .into_iter()
        .filter(|tx| tx.tx_type == TxType::Earnings)
        .collect();
    assert_eq!(earnings.len(), 1);
    assert_eq!(earnings[0].amount, Decimal::from(500));
    assert_eq!(
        p.users.get_user_by_email("alice@example.com").unwrap().balance,
        registered.balance + Decimal::from(500)
    );
}

#[tokio::test]
async fn admin_message_unread_until_user_opens_thread() {
    let p = platform();
    let registered = p.users.register(alice()).await.unwrap();

    p.chat.send_message(&registered.uid, Sender::Admin, Some("Alice Martin"), "Hello").unwrap();
    let preview = p.chat.get_thread_preview(&registered.uid).unwrap();
    assert_eq!(preview.last_message, "Hello");
    assert!(preview.is_unread_for(Sender::User));

    p.chat.mark_thread_read(&registered.uid, Sender::User).unwrap();
    assert!(!p.chat.get_thread_preview(&registered.uid).unwrap().is_unread_for(Sender::User));
}

#[tokio::test]
async fn approving_pending_verification_sets_approved_date() {
    let p = platform();
    p.users.register(alice()).await.unwrap();

    let request = p.verification
        .submit_verification(NewVerification {
            user_email: "alice@example.com".to_string(),
            user_name: "Alice Martin".to_string(),
            document_type: Some(DocumentType::Passport),
            front_image: Some("data:image/png;base64,cG5n".to_string()),
            selfie_image: Some("data:image/png;base64,cG5n".to_string()),
            ..Default::default()
        }).await
        .unwrap();
    assert_eq!(request.status, ReviewStatus::Pending);

    p.verification.update_verification_status(&request.id, ReviewStatus::Approved, None).await.unwrap();

    let stored = p.verification.get_verification_by_id(&request.id).unwrap();
    assert_eq!(stored.status, ReviewStatus::Approved);
    assert!(stored.approved_date.is_some());
}

#[tokio::test]
async fn sled_store_keeps_accounts_and_session() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(SledStorage::open(dir.path()).unwrap());
    let p = Platform::new(RecordStore::new(backend), PlatformPolicy::default());

    let registered = p.users.register(alice()).await.unwrap();

    assert_eq!(p.users.get_current_user().unwrap().uid, registered.uid);
    assert_eq!(p.activity.get_dashboard_stats().await.total_users, 1);
}
