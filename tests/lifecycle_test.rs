mod helpers;

use giveaway_bot::db::models::{GiveawayKey, Phase};
use giveaway_bot::error::GiveawayError;
use giveaway_bot::giveaway::JoinOutcome;
use giveaway_bot::tasks::TimerSlot;
use helpers::*;
use std::collections::HashSet;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn two_winners_out_of_five_are_drawn_and_recorded() {
    let (service, transport) = service();
    let receipt = service.start(start_request(2, "1h", "Gift Card", None)).await.unwrap();
    assert_eq!(receipt.prize, "Gift Card");
    join_all(&service, &[11, 12, 13, 14, 15]).await;

    advance(3601).await;

    assert!(!service.registry().is_live(&KEY));
    assert!(!service.scheduler().has_group(&KEY));

    let notices = transport.notices();
    assert_eq!(notices.len(), 1);
    let result = &notices[0];
    assert!(result.text.contains("Gift Card"));

    let record = service.history_record(result.message.message_id).await.expect("history written");
    assert_eq!(record.participants.len(), 5);
    assert_eq!(record.winner_ids.len(), 2);
    let distinct: HashSet<u64> = record.winner_ids.iter().copied().collect();
    assert_eq!(distinct.len(), 2);
    for winner in &record.winner_ids {
        assert!((11..=15).contains(winner));
        assert!(result.text.contains(&format!("<@{winner}>")));
    }

    // the live announcement ends up in its closed form without a button
    let last = transport.edits().last().cloned().unwrap();
    assert_eq!(last.message, receipt.announcement);
    assert!(last.text.contains("Ended"));
    assert!(!last.with_button);
}

#[tokio::test(start_paused = true)]
async fn role_gated_draw_only_picks_current_holders() {
    let (service, transport) = service();
    for member in [21, 22, 23, 24] {
        service.assign_role(ADMIN, "vip", member).await.unwrap();
    }
    service.start(start_request(3, "10m", "Merch", Some("VIP"))).await.unwrap();
    join_all(&service, &[21, 22, 23, 24]).await;

    // three of them lose the role before the draw
    for member in [21, 22, 23] {
        service.remove_role(ADMIN, "vip", member).await.unwrap();
    }
    advance(601).await;

    let result = transport.notices().pop().unwrap();
    let record = service.history_record(result.message.message_id).await.unwrap();
    assert_eq!(record.participants.len(), 4);
    assert_eq!(record.winner_ids, vec![24]);
}

#[tokio::test(start_paused = true)]
async fn participation_requires_the_role() {
    let (service, _transport) = service();
    service.assign_role(ADMIN, "vip", 30).await.unwrap();
    service.start(start_request(1, "10m", "Merch", Some("vip"))).await.unwrap();

    let err = service.participate(KEY, 31, "outsider").await.unwrap_err();
    assert!(matches!(err, GiveawayError::RoleRequired(ref r) if r == "vip"));
    assert_eq!(service.participate(KEY, 30, "insider").await.unwrap(), JoinOutcome::Joined);
    // admins are never gated
    assert_eq!(service.participate(KEY, ADMIN, "admin").await.unwrap(), JoinOutcome::Joined);
    assert_eq!(service.snapshot(&KEY).unwrap().participants.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn joining_twice_counts_once() {
    let (service, transport) = service();
    service.start(start_request(1, "10m", "Merch", None)).await.unwrap();

    assert_eq!(service.participate(KEY, 40, "Ann").await.unwrap(), JoinOutcome::Joined);
    settle().await;
    let edits_after_first = transport.edits().len();
    assert_eq!(edits_after_first, 1);
    assert_eq!(service.participate(KEY, 40, "Ann").await.unwrap(), JoinOutcome::AlreadyJoined);
    settle().await;

    assert_eq!(service.snapshot(&KEY).unwrap().participants.len(), 1);
    // the repeat does not re-render
    assert_eq!(transport.edits().len(), edits_after_first);
}

#[tokio::test(start_paused = true)]
async fn empty_draw_reports_no_winners_and_still_records() {
    let (service, transport) = service();
    service.start(start_request(2, "1m", "Sticker", None)).await.unwrap();

    advance(61).await;

    assert!(!service.registry().is_live(&KEY));
    let result = transport.notices().pop().unwrap();
    assert!(result.text.contains("nobody eligible"));
    let record = service.history_record(result.message.message_id).await.unwrap();
    assert!(record.participants.is_empty());
    assert!(record.winner_ids.is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancel_stops_everything_and_leaves_no_history() {
    let (service, transport) = service();
    let receipt = service.start(start_request(1, "5m", "Merch", None)).await.unwrap();
    join_all(&service, &[50, 51]).await;

    assert!(matches!(service.cancel(KEY, 50).await, Err(GiveawayError::AdminOnly)));
    let state = service.cancel(KEY, ADMIN).await.unwrap();
    assert_eq!(state.participants.len(), 2);
    assert!(!service.registry().is_live(&KEY));
    assert!(!service.scheduler().has_group(&KEY));

    let last = transport.edits().last().cloned().unwrap();
    assert_eq!(last.message, receipt.announcement);
    assert!(last.text.contains("cancelled"));

    advance(600).await;
    assert!(transport.notices().is_empty());
    assert!(matches!(service.cancel(KEY, ADMIN).await, Err(GiveawayError::NoActiveGiveaway)));
    assert!(matches!(service.participate(KEY, 52, "late").await, Err(GiveawayError::NoActiveGiveaway)));
}

#[tokio::test(start_paused = true)]
async fn one_giveaway_per_location() {
    let (service, transport) = service();
    service.start(start_request(1, "5m", "First", None)).await.unwrap();

    let again = service.start(start_request(1, "5m", "Second", None)).await;
    assert!(matches!(again, Err(GiveawayError::AlreadyRunning)));
    assert_eq!(service.snapshot(&KEY).unwrap().prize, "First");

    // a thread under the same chat is a different location
    let mut in_thread = start_request(1, "5m", "Thread prize", None);
    in_thread.key = GiveawayKey::new(KEY.chat_id, Some(77));
    service.start(in_thread).await.unwrap();
    assert_eq!(service.registry().len(), 2);
    assert_eq!(transport.sent().last().unwrap().location.channel_id(), 77);
}

#[tokio::test(start_paused = true)]
async fn invalid_starts_change_nothing() {
    let (service, transport) = service();

    let mut not_admin = start_request(1, "5m", "Merch", None);
    not_admin.requester_id = 99;
    assert!(matches!(service.start(not_admin).await, Err(GiveawayError::AdminOnly)));
    assert!(matches!(
        service.start(start_request(0, "5m", "Merch", None)).await,
        Err(GiveawayError::InvalidWinnerCount)
    ));
    assert!(matches!(
        service.start(start_request(-3, "5m", "Merch", None)).await,
        Err(GiveawayError::InvalidWinnerCount)
    ));
    assert!(matches!(
        service.start(start_request(1, "10s", "Merch", None)).await,
        Err(GiveawayError::InvalidDuration(_))
    ));
    assert!(matches!(
        service.start(start_request(1, "5m", "   ", None)).await,
        Err(GiveawayError::MissingPrize)
    ));
    assert!(matches!(
        service.start(start_request(1, "5m", "Merch", Some("ghost"))).await,
        Err(GiveawayError::UnknownRole(_))
    ));

    assert!(service.registry().is_empty());
    assert!(transport.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_announcement_rolls_the_start_back() {
    let (service, transport) = service();
    transport.set_fail_sends(true);

    let err = service.start(start_request(1, "5m", "Merch", None)).await.unwrap_err();
    assert!(matches!(err, GiveawayError::Transport(_)));
    assert!(!service.registry().is_live(&KEY));
    assert!(!service.scheduler().has_group(&KEY));

    transport.set_fail_sends(false);
    service.start(start_request(1, "5m", "Merch", None)).await.unwrap();
    assert!(service.registry().is_live(&KEY));
}

#[tokio::test(start_paused = true)]
async fn slow_phase_hands_over_to_fast_phase() {
    let (service, _transport) = service();
    service.start(start_request(1, "2m", "Merch", None)).await.unwrap();
    assert!(service.scheduler().is_active(&KEY, TimerSlot::SlowRefresh));
    assert!(!service.scheduler().is_active(&KEY, TimerSlot::FastRefresh));
    assert_eq!(service.snapshot(&KEY).unwrap().phase, Phase::Open);

    advance(61).await;

    assert_eq!(service.snapshot(&KEY).unwrap().phase, Phase::FinalMinute);
    assert!(!service.scheduler().is_active(&KEY, TimerSlot::SlowRefresh));
    assert!(service.scheduler().is_active(&KEY, TimerSlot::FastRefresh));
    assert!(service.scheduler().is_active(&KEY, TimerSlot::Draw));
    // still open for entries in the final minute
    assert_eq!(service.participate(KEY, 60, "late").await.unwrap(), JoinOutcome::Joined);
}

#[tokio::test(start_paused = true)]
async fn short_giveaways_only_use_the_fast_countdown() {
    let (service, transport) = service();
    let receipt = service.start(start_request(1, "1m", "Merch", None)).await.unwrap();
    assert!(service.scheduler().is_active(&KEY, TimerSlot::FastRefresh));
    assert!(!service.scheduler().is_active(&KEY, TimerSlot::SlowRefresh));
    assert!(!service.scheduler().is_active(&KEY, TimerSlot::Transition));

    let ticks = || transport.edits().iter().filter(|e| e.message == receipt.announcement && e.with_button).count();
    // the fast countdown starts right away
    settle().await;
    assert_eq!(ticks(), 1);
    advance(10).await;
    assert_eq!(ticks(), 4);
}

#[tokio::test(start_paused = true)]
async fn slow_announcement_does_not_delay_the_draw() {
    let (service, transport) = service();
    transport.delay_next_send(Duration::from_secs(5));
    service.start(start_request(1, "1m", "Merch", None)).await.unwrap();

    // the announcement took 5 of the 60 seconds
    advance(56).await;
    assert!(!service.registry().is_live(&KEY));
    assert_eq!(transport.notices().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn entry_is_acknowledged_without_waiting_for_the_rerender() {
    let (service, transport) = service();
    let receipt = service.start(start_request(1, "10m", "Merch", None)).await.unwrap();
    transport.set_edit_delay(Some(Duration::from_secs(10)));

    let joined = tokio::time::timeout(Duration::from_secs(1), service.participate(KEY, 40, "Ann")).await;
    assert!(matches!(joined, Ok(Ok(JoinOutcome::Joined))));
    assert!(transport.edits().is_empty());

    advance(11).await;
    let edit = transport.edits().pop().unwrap();
    assert_eq!(edit.message, receipt.announcement);
    assert!(edit.text.contains("**Participants:** 1"));
}

#[tokio::test(start_paused = true)]
async fn failed_refresh_stops_the_countdown_but_not_the_draw() {
    let (service, transport) = service();
    service.start(start_request(1, "10m", "Merch", None)).await.unwrap();
    transport.set_fail_edits(true);

    advance(61).await;
    assert_eq!(transport.edits().iter().filter(|e| e.failed).count(), 1);
    assert!(!service.scheduler().is_active(&KEY, TimerSlot::SlowRefresh));
    assert!(service.scheduler().is_active(&KEY, TimerSlot::Draw));

    advance(180).await;
    assert_eq!(transport.edits().iter().filter(|e| e.failed).count(), 1);
    assert!(service.registry().is_live(&KEY));

    transport.set_fail_edits(false);
    advance(400).await;
    assert!(!service.registry().is_live(&KEY));
    assert_eq!(transport.notices().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn draw_in_progress_rejects_entries_and_cancel() {
    let mut settings = settings();
    settings.draw_pause = Duration::from_secs(5);
    let (service, transport) = service_with(settings);
    service.start(start_request(1, "1m", "Merch", None)).await.unwrap();
    join_all(&service, &[70]).await;

    advance(62).await;
    assert_eq!(service.snapshot(&KEY).unwrap().phase, Phase::Drawing);
    assert!(transport.edits().iter().any(|e| e.text.contains("Drawing")));
    assert!(matches!(service.participate(KEY, 71, "late").await, Err(GiveawayError::NoActiveGiveaway)));
    assert!(matches!(service.cancel(KEY, ADMIN).await, Err(GiveawayError::DrawInProgress)));

    advance(5).await;
    assert!(!service.registry().is_live(&KEY));
    let record = service.history_record(transport.notices()[0].message.message_id).await.unwrap();
    assert_eq!(record.winner_ids, vec![70]);
}

#[tokio::test(start_paused = true)]
async fn failed_result_announcement_drops_the_giveaway() {
    let (service, transport) = service();
    service.start(start_request(1, "1m", "Merch", None)).await.unwrap();
    join_all(&service, &[80]).await;
    transport.set_fail_sends(true);

    advance(61).await;

    assert!(!service.registry().is_live(&KEY));
    assert!(transport.notices().is_empty());
    // a new giveaway can start at the same location
    transport.set_fail_sends(false);
    service.start(start_request(1, "1m", "Merch again", None)).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn result_photo_follows_the_winners_when_configured() {
    let mut settings = settings();
    settings.result_image_url = Some("https://example.org/trophy.png".into());
    let (service, transport) = service_with(settings);
    service.start(start_request(1, "1m", "Merch", None)).await.unwrap();
    join_all(&service, &[90]).await;

    advance(61).await;

    let photos = transport.photos();
    assert_eq!(photos.len(), 1);
    assert_eq!(photos[0].1, "https://example.org/trophy.png");
    assert!(photos[0].2.contains("1 winner(s)"));
}

#[tokio::test(start_paused = true)]
async fn history_write_is_retried_after_a_failed_save() {
    let (service, transport, store) = service_on_flaky_store();
    service.start(start_request(1, "1m", "Merch", None)).await.unwrap();
    join_all(&service, &[8]).await;
    store.fail_next_saves(2);

    advance(66).await;

    let notices = transport.notices();
    assert_eq!(notices.len(), 1);
    let record = service.history_record(notices[0].message.message_id).await.expect("saved on retry");
    assert_eq!(record.winner_ids, vec![8]);
    assert!(!service.registry().is_live(&KEY));
}

#[tokio::test(start_paused = true)]
async fn unsaved_result_is_announced_as_not_rerollable() {
    let (service, transport, store) = service_on_flaky_store();
    service.start(start_request(1, "1m", "Merch", None)).await.unwrap();
    join_all(&service, &[8]).await;
    store.fail_next_saves(3);

    advance(66).await;

    let notices = transport.notices();
    assert_eq!(notices.len(), 2);
    assert!(notices[0].text.contains("<@8>"));
    assert!(notices[1].text.contains("cannot be rerolled"));
    assert_eq!(service.history_record(notices[0].message.message_id).await, None);
    assert!(!service.registry().is_live(&KEY));
}
