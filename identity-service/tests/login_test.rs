//! Local login state machine, lockout behavior in particular.

mod common;

use common::*;
use identity_service::store::CredentialStore;
use identity_service::services::LoginOutcome;

#[tokio::test]
async fn login_with_correct_credentials_succeeds() {
    let h = harness_with(false);
    let user_id = register_confirmed(&h, "alice", "alice@example.com", "hunter2hunter2").await;

    let outcome = h
        .accounts
        .login(login_request("alice", "hunter2hunter2"))
        .await
        .unwrap();

    match outcome {
        LoginOutcome::Succeeded(session) => {
            assert_eq!(session.user_id, user_id);
            assert_eq!(session.email, "alice@example.com");
            assert!(session.roles.contains(&"User".to_string()));
            let claims = h.issuer.decode(&session.token).unwrap();
            assert_eq!(claims.subject_id(), Some(user_id));
        }
        other => panic!("expected Succeeded, got {:?}", other),
    }
}

#[tokio::test]
async fn login_by_email_address_also_works() {
    let h = harness_with(false);
    register_confirmed(&h, "alice", "alice@example.com", "hunter2hunter2").await;

    let outcome = h
        .accounts
        .login(login_request("alice@example.com", "hunter2hunter2"))
        .await
        .unwrap();
    assert_succeeded(&outcome);
}

#[tokio::test]
async fn unknown_user_and_wrong_password_are_indistinguishable() {
    let h = harness_with(false);
    register_confirmed(&h, "alice", "alice@example.com", "hunter2hunter2").await;

    let unknown = h
        .accounts
        .login(login_request("nobody", "whatever123"))
        .await
        .unwrap();
    let wrong = h
        .accounts
        .login(login_request("alice", "not-the-password1"))
        .await
        .unwrap();

    match (unknown, wrong) {
        (LoginOutcome::Failed(a), LoginOutcome::Failed(b)) => assert_eq!(a, b),
        (a, b) => panic!("expected two Failed outcomes, got {:?} / {:?}", a, b),
    }
}

#[tokio::test]
async fn reaching_the_threshold_locks_the_account() {
    let h = harness_with(false);
    register_confirmed(&h, "alice", "alice@example.com", "hunter2hunter2").await;

    for attempt in 1..=MAX_FAILED_ATTEMPTS {
        let outcome = h
            .accounts
            .login(login_request("alice", "wrong-password1"))
            .await
            .unwrap();
        if attempt < MAX_FAILED_ATTEMPTS {
            assert!(
                matches!(outcome, LoginOutcome::Failed(_)),
                "attempt {} should be Failed, got {:?}",
                attempt,
                outcome
            );
        } else {
            // The attempt that reaches the threshold already reports the
            // lockout.
            assert!(matches!(outcome, LoginOutcome::LockedOut));
        }
    }
}

#[tokio::test]
async fn correct_password_during_lockout_is_still_locked_out() {
    let h = harness_with(false);
    register_confirmed(&h, "alice", "alice@example.com", "hunter2hunter2").await;

    for _ in 0..MAX_FAILED_ATTEMPTS {
        h.accounts
            .login(login_request("alice", "wrong-password1"))
            .await
            .unwrap();
    }

    let outcome = h
        .accounts
        .login(login_request("alice", "hunter2hunter2"))
        .await
        .unwrap();
    assert!(matches!(outcome, LoginOutcome::LockedOut));
}

#[tokio::test]
async fn successful_login_resets_the_failure_counter() {
    let h = harness_with(false);
    register_confirmed(&h, "alice", "alice@example.com", "hunter2hunter2").await;

    // Two failures, then a success, then threshold-minus-one failures: the
    // counter restarted, so no lockout.
    for _ in 0..(MAX_FAILED_ATTEMPTS - 1) {
        h.accounts
            .login(login_request("alice", "wrong-password1"))
            .await
            .unwrap();
    }
    let outcome = h
        .accounts
        .login(login_request("alice", "hunter2hunter2"))
        .await
        .unwrap();
    assert_succeeded(&outcome);

    for _ in 0..(MAX_FAILED_ATTEMPTS - 1) {
        let outcome = h
            .accounts
            .login(login_request("alice", "wrong-password1"))
            .await
            .unwrap();
        assert!(
            matches!(outcome, LoginOutcome::Failed(_)),
            "counter should have restarted, got {:?}",
            outcome
        );
    }
}

#[tokio::test]
async fn unconfirmed_account_is_not_allowed_when_confirmation_required() {
    let h = harness();
    h.accounts
        .register(register_request("bob", "bob@example.com", "hunter2hunter2"))
        .await
        .unwrap();

    let outcome = h
        .accounts
        .login(login_request("bob", "hunter2hunter2"))
        .await
        .unwrap();
    assert!(matches!(outcome, LoginOutcome::NotAllowed));
}

#[tokio::test]
async fn lockout_takes_priority_over_not_allowed() {
    let h = harness();
    h.accounts
        .register(register_request("bob", "bob@example.com", "hunter2hunter2"))
        .await
        .unwrap();

    // Lock the still-unconfirmed account via the store.
    let identity = h.store.find_by_username("bob").await.unwrap().unwrap();
    h.store
        .set_lockout(identity.id, chrono::Utc::now() + chrono::Duration::minutes(15))
        .await
        .unwrap();

    let outcome = h
        .accounts
        .login(login_request("bob", "hunter2hunter2"))
        .await
        .unwrap();
    assert!(matches!(outcome, LoginOutcome::LockedOut));
}

#[tokio::test]
async fn two_factor_account_reports_requires_two_factor() {
    let h = harness_with(false);
    register_confirmed(&h, "carol", "carol@example.com", "hunter2hunter2").await;

    let mut identity = h.store.find_by_username("carol").await.unwrap().unwrap();
    identity.two_factor_enabled = true;
    h.store.update_identity(&identity).await.unwrap();

    let outcome = h
        .accounts
        .login(login_request("carol", "hunter2hunter2"))
        .await
        .unwrap();
    assert!(matches!(outcome, LoginOutcome::RequiresTwoFactor));
}
