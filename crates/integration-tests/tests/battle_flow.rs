use std::sync::Arc;

use integration_tests::{memory_store, seed_group, FlakyStore};
use pb_core::{
    project, AppError, Arena, BattleConfig, BattleSelector, PhotoId, PhotoRepo, SessionState,
};

fn arena(repo: Arc<dyn PhotoRepo>) -> Arena {
    Arena::new(repo, BattleConfig::default().without_delay())
}

#[tokio::test]
async fn winner_and_loser_counters_move_once() {
    let store = memory_store().await;
    let (group_id, _) = seed_group(&store, 2).await;
    let arena = arena(store.clone());
    let session = arena.open_session_with(group_id.clone(), "voter".into(), BattleSelector::seeded(5));
    arena.next_round(&session).await.unwrap();

    let (a, b) = {
        let guard = session.lock().await;
        let [a, b] = guard.state().pair().unwrap().photos();
        (a.clone(), b.clone())
    };

    let vote = arena.vote(&session, &a.id).await.unwrap();
    assert_eq!(vote.winner_photo_id, a.id);
    assert_eq!(vote.loser_photo_id, b.id);

    let winner = store.get_photo(&a.id).await.unwrap().unwrap();
    let loser = store.get_photo(&b.id).await.unwrap().unwrap();
    assert_eq!((winner.votes_count, winner.wins_count), (a.votes_count + 1, a.wins_count + 1));
    assert_eq!((loser.votes_count, loser.wins_count), (b.votes_count + 1, b.wins_count));
    assert_eq!(store.votes_for_group(&group_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn network_failure_changes_nothing_and_retry_succeeds() {
    let store = memory_store().await;
    let (group_id, _) = seed_group(&store, 2).await;
    let flaky = Arc::new(FlakyStore::new(store.clone()));
    let arena = arena(flaky.clone());
    let session = arena.open_session(group_id.clone(), "voter".into());
    arena.next_round(&session).await.unwrap();
    let pair = session.lock().await.state().pair().cloned().unwrap();
    let winner = pair.photos()[0].id.clone();

    flaky.set_offline(true);
    let err = arena.vote(&session, &winner).await.unwrap_err();
    assert!(matches!(err, AppError::VoteWriteFailure(_)));

    {
        let mut guard = session.lock().await;
        assert_eq!(guard.state().pair(), Some(&pair));
        assert!(guard.state().can_vote());
        assert_eq!(guard.take_notifications()[0].title, "Failed to record vote");
    }
    for photo in pair.photos() {
        let stored = store.get_photo(&photo.id).await.unwrap().unwrap();
        assert_eq!(stored.tally(), photo.tally());
    }
    assert!(store.votes_for_group(&group_id).await.unwrap().is_empty());

    flaky.set_offline(false);
    arena.vote(&session, &winner).await.unwrap();
    assert_eq!(store.votes_for_group(&group_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn long_session_keeps_counters_equal_to_the_log() {
    let store = memory_store().await;
    let (group_id, photos) = seed_group(&store, 6).await;
    let arena = arena(store.clone());
    let session = arena.open_session_with(group_id.clone(), "voter".into(), BattleSelector::seeded(99));
    arena.next_round(&session).await.unwrap();

    for round in 0..40 {
        let winner: PhotoId = {
            let guard = session.lock().await;
            let pair = guard.state().pair().expect("pair on screen");
            pair.photos()[round % 2].id.clone()
        };
        arena.vote(&session, &winner).await.unwrap();
        assert!(matches!(session.lock().await.state(), SessionState::BattleReady { .. }));
    }

    let log = store.votes_for_group(&group_id).await.unwrap();
    assert_eq!(log.len(), 40);
    assert!(log.iter().all(|v| v.winner_photo_id != v.loser_photo_id));

    let projected = project(&log);
    for photo in &photos {
        let stored = store.get_photo(&photo.id).await.unwrap().unwrap();
        let expected = projected.get(&photo.id).copied().unwrap_or_default();
        assert_eq!(stored.tally(), expected);
        assert!(stored.wins_count <= stored.votes_count);
    }
}

#[tokio::test]
async fn one_photo_group_stays_empty_until_another_arrives() {
    let store = memory_store().await;
    let (group_id, _) = seed_group(&store, 1).await;
    let arena = arena(store.clone());
    let session = arena.open_session(group_id.clone(), "voter".into());

    arena.next_round(&session).await.unwrap();
    assert_eq!(session.lock().await.state(), &SessionState::Empty);

    store
        .insert_photo(pb_core::NewPhoto {
            group_id: group_id.clone(),
            owner_id: "late".into(),
            title: None,
            image_url: "/uploads/late.jpg".into(),
        })
        .await
        .unwrap();

    arena.next_round(&session).await.unwrap();
    assert!(session.lock().await.state().can_vote());
}
