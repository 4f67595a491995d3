//! Password reset flow and its anti-enumeration contract.

mod common;

use common::*;

#[tokio::test]
async fn reset_flow_replaces_the_password() {
    let h = harness_with(false);
    register_confirmed(&h, "alice", "alice@example.com", "hunter2hunter2").await;

    h.accounts
        .request_password_reset("alice@example.com")
        .await
        .unwrap();
    let token = latest_token_for(&h, "alice@example.com").unwrap();

    h.accounts
        .reset_password(&token, "brand-new-pass9")
        .await
        .unwrap();

    let old = h
        .accounts
        .login(login_request("alice", "hunter2hunter2"))
        .await
        .unwrap();
    assert!(!matches!(old, identity_service::services::LoginOutcome::Succeeded(_)));

    let new = h
        .accounts
        .login(login_request("alice", "brand-new-pass9"))
        .await
        .unwrap();
    assert_succeeded(&new);
}

#[tokio::test]
async fn requests_for_known_and_unknown_emails_are_indistinguishable() {
    let h = harness_with(false);
    register_confirmed(&h, "alice", "alice@example.com", "hunter2hunter2").await;

    // Both calls return Ok with no distinguishing signal; only the mailbox
    // differs, which an attacker cannot observe.
    let known = h.accounts.request_password_reset("alice@example.com").await;
    let unknown = h.accounts.request_password_reset("ghost@example.com").await;
    assert!(known.is_ok());
    assert!(unknown.is_ok());

    let to_ghost = h
        .sender
        .messages()
        .iter()
        .filter(|m| m.to == "ghost@example.com")
        .count();
    assert_eq!(to_ghost, 0);
}

#[tokio::test]
async fn reset_token_is_single_use() {
    let h = harness_with(false);
    register_confirmed(&h, "alice", "alice@example.com", "hunter2hunter2").await;

    h.accounts
        .request_password_reset("alice@example.com")
        .await
        .unwrap();
    let token = latest_token_for(&h, "alice@example.com").unwrap();

    h.accounts.reset_password(&token, "brand-new-pass9").await.unwrap();
    assert!(h
        .accounts
        .reset_password(&token, "another-pass123")
        .await
        .is_err());
}

#[tokio::test]
async fn a_confirmation_token_cannot_reset_a_password() {
    let h = harness();
    h.accounts
        .register(register_request("alice", "alice@example.com", "hunter2hunter2"))
        .await
        .unwrap();

    // The registration email carries an email-confirmation token; redeeming
    // it through the reset path must fail.
    let token = latest_token_for(&h, "alice@example.com").unwrap();
    assert!(h
        .accounts
        .reset_password(&token, "brand-new-pass9")
        .await
        .is_err());
}

#[tokio::test]
async fn completed_reset_clears_an_active_lockout() {
    let h = harness_with(false);
    register_confirmed(&h, "alice", "alice@example.com", "hunter2hunter2").await;

    for _ in 0..MAX_FAILED_ATTEMPTS {
        h.accounts
            .login(login_request("alice", "wrong-password1"))
            .await
            .unwrap();
    }

    h.accounts
        .request_password_reset("alice@example.com")
        .await
        .unwrap();
    let token = latest_token_for(&h, "alice@example.com").unwrap();
    h.accounts.reset_password(&token, "brand-new-pass9").await.unwrap();

    let outcome = h
        .accounts
        .login(login_request("alice", "brand-new-pass9"))
        .await
        .unwrap();
    assert_succeeded(&outcome);
}

#[tokio::test]
async fn reset_enforces_the_password_policy() {
    let h = harness_with(false);
    register_confirmed(&h, "alice", "alice@example.com", "hunter2hunter2").await;

    h.accounts
        .request_password_reset("alice@example.com")
        .await
        .unwrap();
    let token = latest_token_for(&h, "alice@example.com").unwrap();

    // Policy failure must not consume the token.
    assert!(h.accounts.reset_password(&token, "short").await.is_err());
    assert!(h
        .accounts
        .reset_password(&token, "long-enough-pass1")
        .await
        .is_ok());
}
