//! Unit of work and session lifecycle against a real SQLite database.

#![allow(clippy::panic)]

mod common;

use std::time::Duration;

use restodir::domain::{EntityId, NewRestaurant, NewReview, Restaurant, Review};
use restodir::persistence::{
    Filters, PoolLifecycle, Repository, StoreError, UnitOfWorkState, WriteMode,
};

use common::{seed_restaurant, sqlite_db, sqlite_db_sized};

async fn count<E: restodir::persistence::Entity>(db: &restodir::persistence::Database) -> usize {
    let repo = db.repositories().repository::<E>();
    let Ok(mut session) = db.sessions().acquire().await else {
        panic!("acquire");
    };
    match repo.find(&mut session, &Filters::new(), 0, 1000).await {
        Ok(rows) => rows.len(),
        Err(e) => panic!("count failed: {e}"),
    }
}

/// Waits until every capacity slot has been returned.
async fn wait_until_released(db: &restodir::persistence::Database) {
    for _ in 0..200 {
        if db.status().in_use == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("connections were not released: {:?}", db.status());
}

#[tokio::test]
async fn staged_writes_commit_together() {
    let db = sqlite_db().await;
    let restaurants = db.repositories().repository::<Restaurant>();
    let reviews = db.repositories().repository::<Review>();

    let Ok(mut uow) = db.sessions().unit_of_work().await else {
        panic!("unit of work");
    };
    assert_eq!(uow.state(), UnitOfWorkState::Open);
    let Ok(restaurant) = restaurants
        .create(&mut uow, NewRestaurant::new("Test", "Tunja"), "u1", WriteMode::Stage)
        .await
    else {
        panic!("stage restaurant");
    };
    let review = NewReview {
        restaurant_id: restaurant.audit.id.clone(),
        rating: 5,
        comment: Some("excelente".to_string()),
    };
    assert!(reviews.create(&mut uow, review, "u1", WriteMode::Stage).await.is_ok());

    // Not visible outside the transaction yet.
    assert_eq!(count::<Restaurant>(&db).await, 0);

    assert!(uow.commit().await.is_ok());
    assert_eq!(count::<Restaurant>(&db).await, 1);
    assert_eq!(count::<Review>(&db).await, 1);
}

#[tokio::test]
async fn rollback_discards_staged_writes() {
    let db = sqlite_db().await;
    let restaurants = db.repositories().repository::<Restaurant>();

    let Ok(mut uow) = db.sessions().unit_of_work().await else {
        panic!("unit of work");
    };
    assert!(
        restaurants
            .create(&mut uow, NewRestaurant::new("Test", "Tunja"), "u1", WriteMode::Stage)
            .await
            .is_ok()
    );
    assert!(uow.rollback().await.is_ok());
    assert_eq!(count::<Restaurant>(&db).await, 0);
}

#[tokio::test]
async fn parent_and_child_are_discarded_together() {
    let db = sqlite_db().await;
    let restaurants = db.repositories().repository::<Restaurant>();
    let reviews = db.repositories().repository::<Review>();

    for explicit_rollback in [true, false] {
        let Ok(mut uow) = db.sessions().unit_of_work().await else {
            panic!("unit of work");
        };
        let Ok(parent) = restaurants
            .create(&mut uow, NewRestaurant::new("A", "Tunja"), "u1", WriteMode::Stage)
            .await
        else {
            panic!("stage restaurant");
        };
        let child = NewReview {
            restaurant_id: parent.audit.id.clone(),
            rating: 4,
            comment: Some("B".to_string()),
        };
        assert!(reviews.create(&mut uow, child, "u1", WriteMode::Stage).await.is_ok());

        if explicit_rollback {
            assert!(uow.rollback().await.is_ok());
        } else {
            drop(uow);
            wait_until_released(&db).await;
        }
        assert_eq!(count::<Restaurant>(&db).await, 0);
        assert_eq!(count::<Review>(&db).await, 0);
    }
}

#[tokio::test]
async fn commit_mode_inside_unit_of_work_is_rejected() {
    let db = sqlite_db().await;
    let restaurants = db.repositories().repository::<Restaurant>();

    let Ok(mut uow) = db.sessions().unit_of_work().await else {
        panic!("unit of work");
    };
    let result = restaurants
        .create(&mut uow, NewRestaurant::new("Test", "Tunja"), "u1", WriteMode::Commit)
        .await;
    assert!(matches!(result, Err(StoreError::UnitOfWorkMisuse(_))));
    assert!(uow.in_unit_of_work());
    assert!(uow.rollback().await.is_ok());
}

#[tokio::test]
async fn failed_statement_makes_commit_fail() {
    let db = sqlite_db().await;
    let restaurants = db.repositories().repository::<Restaurant>();
    let reviews = db.repositories().repository::<Review>();

    let Ok(mut uow) = db.sessions().unit_of_work().await else {
        panic!("unit of work");
    };
    assert!(
        restaurants
            .create(&mut uow, NewRestaurant::new("Test", "Tunja"), "u1", WriteMode::Stage)
            .await
            .is_ok()
    );
    let orphan = NewReview {
        restaurant_id: EntityId::new(),
        rating: 3,
        comment: None,
    };
    let staged = reviews.create(&mut uow, orphan, "u1", WriteMode::Stage).await;
    assert!(matches!(staged, Err(StoreError::IntegrityViolation(_))));

    let committed = uow.commit().await;
    assert!(matches!(committed, Err(StoreError::TransactionConflict(_))));
    assert_eq!(count::<Restaurant>(&db).await, 0);
}

#[tokio::test]
async fn dropped_unit_of_work_is_rolled_back_before_reuse() {
    let db = sqlite_db_sized(1, 0).await;
    let restaurants = db.repositories().repository::<Restaurant>();

    {
        let Ok(mut uow) = db.sessions().unit_of_work().await else {
            panic!("unit of work");
        };
        assert!(
            restaurants
                .create(&mut uow, NewRestaurant::new("Lost", "Tunja"), "u1", WriteMode::Stage)
                .await
                .is_ok()
        );
    }

    // The single connection is handed out only after its reset finished.
    let Ok(uow) = db.sessions().unit_of_work().await else {
        panic!("connection must be clean for a new transaction");
    };
    assert!(uow.rollback().await.is_ok());
    assert_eq!(count::<Restaurant>(&db).await, 0);
}

#[tokio::test]
async fn cancelled_task_releases_its_connection() {
    let db = sqlite_db_sized(2, 0).await;
    let sessions = db.sessions().clone();
    let restaurants = db.repositories().repository::<Restaurant>();

    let task = tokio::spawn(async move {
        let mut uow = sessions.unit_of_work().await?;
        restaurants
            .create(&mut uow, NewRestaurant::new("Cancelled", "Tunja"), "u1", WriteMode::Stage)
            .await?;
        tokio::time::sleep(Duration::from_secs(3600)).await;
        uow.commit().await
    });

    for _ in 0..200 {
        if db.status().in_use > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    task.abort();
    assert!(task.await.is_err());

    wait_until_released(&db).await;
    assert_eq!(count::<Restaurant>(&db).await, 0);
}

#[tokio::test]
async fn cancelled_begin_does_not_leak_a_transaction() {
    let db = sqlite_db_sized(2, 0).await;
    let sessions = db.sessions().clone();
    let restaurants = db.repositories().repository::<Restaurant>();

    let Ok(mut holder) = sessions.unit_of_work().await else {
        panic!("unit of work");
    };
    assert!(
        restaurants
            .create(&mut holder, NewRestaurant::new("Held", "Tunja"), "u1", WriteMode::Stage)
            .await
            .is_ok()
    );

    // The second BEGIN waits on the write lock and is abandoned mid-statement.
    let abandoned = tokio::time::timeout(Duration::from_millis(300), sessions.unit_of_work()).await;
    assert!(abandoned.is_err());

    assert!(holder.commit().await.is_ok());
    wait_until_released(&db).await;

    let (first, second) = tokio::join!(sessions.acquire(), sessions.acquire());
    let (Ok(mut first), Ok(mut second)) = (first, second) else {
        panic!("both connections must be available");
    };
    for (session, name) in [(&mut first, "One"), (&mut second, "Two")] {
        let created = restaurants
            .create(session, NewRestaurant::new(name, "Tunja"), "u2", WriteMode::Commit)
            .await;
        assert!(created.is_ok(), "write on a reused connection failed: {created:?}");
        assert!(!session.in_transaction());
    }
    drop((first, second));
    assert_eq!(count::<Restaurant>(&db).await, 3);
}

#[tokio::test]
async fn shutdown_rejects_new_sessions() {
    let db = sqlite_db().await;
    seed_restaurant(&db, "Test", "Tunja").await;
    db.shutdown().await;
    db.shutdown().await;

    assert_eq!(db.status().lifecycle, PoolLifecycle::Disposed);
    assert!(matches!(
        db.sessions().acquire().await,
        Err(StoreError::PoolClosed)
    ));
    assert!(matches!(
        db.sessions().unit_of_work().await,
        Err(StoreError::PoolClosed)
    ));
}
