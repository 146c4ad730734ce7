#[cfg(test)]
mod tests {
    use crate::db::{
        CompletionKind, add_badge, award_completion, get_progress, get_progress_summaries,
    };
    use crate::rewards::{CHALLENGE_POINTS, TUTORIAL_POINTS};
    use crate::test::test_db::TestDbBuilder;

    #[tokio::test]
    async fn test_new_user_starts_with_empty_progress() {
        let test_db = TestDbBuilder::new()
            .learner("fresh", None)
            .build()
            .await
            .expect("Failed to build test database");
        let id = test_db.user_id("fresh").expect("User not found");

        let progress = get_progress(&test_db.pool, id).await.expect("progress");
        assert_eq!(progress.points, 0);
        assert!(progress.completed_tutorials.is_empty());
        assert!(progress.completed_challenges.is_empty());
        assert!(progress.emoji_collection.is_empty());
    }

    #[tokio::test]
    async fn test_completion_awards_points_exactly_once() {
        let test_db = TestDbBuilder::new()
            .learner("kid", None)
            .build()
            .await
            .expect("Failed to build test database");
        let pool = &test_db.pool;
        let id = test_db.user_id("kid").expect("User not found");

        assert!(
            award_completion(pool, id, CompletionKind::Tutorial, 2, TUTORIAL_POINTS)
                .await
                .expect("award")
        );
        for _ in 0..3 {
            assert!(
                !award_completion(pool, id, CompletionKind::Tutorial, 2, TUTORIAL_POINTS)
                    .await
                    .expect("award")
            );
        }
        assert!(
            award_completion(pool, id, CompletionKind::Challenge, 2, CHALLENGE_POINTS)
                .await
                .expect("award")
        );

        let progress = get_progress(pool, id).await.expect("progress");
        assert_eq!(progress.points, TUTORIAL_POINTS + CHALLENGE_POINTS);
        assert_eq!(progress.completed_tutorials, vec![2]);
        assert_eq!(progress.completed_challenges, vec![2]);
    }

    #[tokio::test]
    async fn test_concurrent_completions_award_once() {
        let test_db = TestDbBuilder::new()
            .learner("racer", None)
            .build()
            .await
            .expect("Failed to build test database");
        let pool = test_db.pool.clone();
        let id = test_db.user_id("racer").expect("User not found");

        let attempts = (0..8).map(|_| {
            let pool = pool.clone();
            tokio::spawn(async move {
                award_completion(&pool, id, CompletionKind::Challenge, 0, CHALLENGE_POINTS).await
            })
        });

        let mut awarded = 0;
        for attempt in attempts.collect::<Vec<_>>() {
            if attempt.await.expect("task panicked").expect("award") {
                awarded += 1;
            }
        }

        assert_eq!(awarded, 1);
        let progress = get_progress(&pool, id).await.expect("progress");
        assert_eq!(progress.points, CHALLENGE_POINTS);
        assert_eq!(progress.completed_challenges, vec![0]);
    }

    #[tokio::test]
    async fn test_badges_are_not_duplicated() {
        let test_db = TestDbBuilder::new()
            .learner("collector", None)
            .build()
            .await
            .expect("Failed to build test database");
        let pool = &test_db.pool;
        let id = test_db.user_id("collector").expect("User not found");

        assert!(add_badge(pool, id, "🦊").await.expect("badge"));
        assert!(!add_badge(pool, id, "🦊").await.expect("badge"));
        assert!(add_badge(pool, id, "🐼").await.expect("badge"));

        let progress = get_progress(pool, id).await.expect("progress");
        assert_eq!(progress.emoji_collection, vec!["🦊", "🐼"]);
    }

    #[tokio::test]
    async fn test_progress_summaries() {
        let test_db = TestDbBuilder::new()
            .learner("leader", None)
            .learner("trailer", None)
            .build()
            .await
            .expect("Failed to build test database");
        let pool = &test_db.pool;
        let leader = test_db.user_id("leader").expect("User not found");

        award_completion(pool, leader, CompletionKind::Tutorial, 0, TUTORIAL_POINTS)
            .await
            .expect("award");
        award_completion(pool, leader, CompletionKind::Challenge, 1, CHALLENGE_POINTS)
            .await
            .expect("award");
        add_badge(pool, leader, "🐢").await.expect("badge");

        let summaries = get_progress_summaries(pool).await.expect("summaries");
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].username, "leader");
        assert_eq!(summaries[0].points, TUTORIAL_POINTS + CHALLENGE_POINTS);
        assert_eq!(summaries[0].tutorials_completed, 1);
        assert_eq!(summaries[0].challenges_completed, 1);
        assert_eq!(summaries[0].emojis_collected, 1);
        assert_eq!(summaries[1].points, 0);
    }
}
