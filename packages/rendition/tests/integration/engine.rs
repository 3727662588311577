use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::storage::{BlobStore, ObjectKey, StorageError};
use common::storage::filesystem::FilesystemBlobStore;
use rendition::config::ImageOptions;
use rendition::events::RenditionEvent;
use rendition::source::MasterSource;
use rendition::{RenditionError, RepositoryError, StoredMaster};

use crate::common::{TestEngine, png};

mod cache_hits {
    use super::*;

    #[tokio::test]
    async fn first_call_renders_to_bounding_box() {
        let app = TestEngine::spawn().await;
        let master = app.master(1, "photo.png", 800, 600).await;

        let asset = app.engine.large(&master).await.unwrap().unwrap();

        assert_eq!((asset.width, asset.height), (256, 192));
        assert_eq!(asset.size, 256);
        assert_eq!(asset.parent_id, 1);
        assert_eq!(asset.name, "__256x192__.photo.png.jpg");
        assert!(asset.created_at >= master.modified_at());
        assert!(
            asset
                .location
                .as_deref()
                .unwrap()
                .starts_with("/media/pictures/scaled/1/")
        );

        let key = ObjectKey::parse(&asset.storage_key).unwrap();
        let bytes = app.store.get(&key).await.unwrap();
        assert_eq!(bytes.len() as u64, asset.byte_size);
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (256, 192));
    }

    #[tokio::test]
    async fn repeated_calls_return_cached_asset() {
        let app = TestEngine::spawn().await;
        let master = app.master(1, "photo.png", 800, 600).await;

        let first = app.engine.get_rendition(&master, 256).await.unwrap().unwrap();
        let second = app.engine.get_rendition(&master, 256).await.unwrap().unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.storage_key, second.storage_key);
        assert_eq!(app.codec.decodes(), 1);
        assert_eq!(app.row_count().await, 1);
        assert_eq!(
            app.events
                .count(|e| matches!(e, RenditionEvent::Hit { asset_id, .. } if *asset_id == first.id)),
            1
        );
    }

    #[tokio::test]
    async fn sizes_are_cached_independently() {
        let app = TestEngine::spawn().await;
        let master = app.master(1, "photo.png", 400, 300).await;

        let tiny = app.engine.tiny(&master).await.unwrap().unwrap();
        let small = app.engine.small(&master).await.unwrap().unwrap();
        let large = app.engine.large(&master).await.unwrap().unwrap();
        let huge = app.engine.huge(&master).await.unwrap().unwrap();

        assert_eq!((tiny.width, tiny.height), (64, 48));
        assert_eq!((small.width, small.height), (128, 96));
        assert_eq!((large.width, large.height), (256, 192));
        assert_eq!((huge.width, huge.height), (384, 288));
        assert_eq!(app.row_count().await, 4);
        assert_eq!(app.codec.decodes(), 4);
    }

    #[tokio::test]
    async fn masters_do_not_share_renditions() {
        let app = TestEngine::spawn().await;
        let a = app.master(1, "a.png", 100, 100).await;
        let b = app.master(2, "b.png", 100, 50).await;

        let ra = app.engine.tiny(&a).await.unwrap().unwrap();
        let rb = app.engine.tiny(&b).await.unwrap().unwrap();

        assert_ne!(ra.id, rb.id);
        assert_eq!((ra.parent_id, rb.parent_id), (1, 2));
        assert_eq!((rb.width, rb.height), (64, 32));
    }
}

mod invalidation {
    use super::*;

    #[tokio::test]
    async fn replaced_master_triggers_regeneration() {
        let app = TestEngine::spawn().await;
        let mut master = app.master(1, "photo.png", 800, 600).await;
        let old = app.engine.large(&master).await.unwrap().unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        master.replace(&png(300, 300)).await.unwrap();

        let new = app.engine.large(&master).await.unwrap().unwrap();

        assert_ne!(new.id, old.id);
        assert_eq!((new.width, new.height), (256, 256));
        assert!(new.created_at >= master.modified_at());
        assert_eq!(app.row_count().await, 1);
        assert_eq!(app.codec.decodes(), 2);

        let old_key = ObjectKey::parse(&old.storage_key).unwrap();
        assert!(!app.store.exists(&old_key).await.unwrap());
        assert_eq!(
            app.events
                .count(|e| matches!(e, RenditionEvent::Stale { asset_id, .. } if *asset_id == old.id)),
            1
        );
    }

    #[tokio::test]
    async fn missing_bytes_trigger_regeneration() {
        let app = TestEngine::spawn().await;
        let master = app.master(1, "photo.png", 800, 600).await;
        let old = app.engine.small(&master).await.unwrap().unwrap();

        app.store
            .delete(&ObjectKey::parse(&old.storage_key).unwrap())
            .await
            .unwrap();

        let new = app.engine.small(&master).await.unwrap().unwrap();

        assert_ne!(new.id, old.id);
        assert!(new.location.is_some());
        assert_eq!(app.row_count().await, 1);
        assert_eq!(
            app.events
                .count(|e| matches!(e, RenditionEvent::Corrupt { asset_id, .. } if *asset_id == old.id)),
            1
        );
    }

    #[tokio::test]
    async fn master_replaced_during_render_is_not_served_as_fresh() {
        let app = TestEngine::builder()
            .codec_delay(Duration::from_millis(300))
            .spawn()
            .await;
        let original = app.master(1, "photo.png", 800, 600).await;
        let mut replaced = original.clone();

        let pending = {
            let engine = app.engine.clone();
            let original = original.clone();
            tokio::spawn(async move { engine.large(&original).await.unwrap().unwrap() })
        };

        // The render has read the old bytes and sits in the codec.
        tokio::time::sleep(Duration::from_millis(100)).await;
        replaced.replace(&png(300, 300)).await.unwrap();

        let outdated = pending.await.unwrap();
        assert_eq!((outdated.width, outdated.height), (256, 192));
        assert!(outdated.created_at < replaced.modified_at());

        let current = app.engine.large(&replaced).await.unwrap().unwrap();

        assert_ne!(current.id, outdated.id);
        assert_eq!((current.width, current.height), (256, 256));
        assert_eq!(app.row_count().await, 1);
        assert_eq!(
            app.events
                .count(|e| matches!(e, RenditionEvent::Stale { asset_id, .. } if *asset_id == outdated.id)),
            1
        );
    }

    #[tokio::test]
    async fn master_modified_in_future_never_hits() {
        let app = TestEngine::spawn().await;
        let uploaded = app.master(1, "photo.png", 200, 100).await;
        let master = StoredMaster::new(
            1,
            uploaded.key().clone(),
            200,
            100,
            Utc::now() + chrono::Duration::hours(1),
            app.store.clone(),
        );

        let first = app.engine.tiny(&master).await.unwrap().unwrap();
        let second = app.engine.tiny(&master).await.unwrap().unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(app.codec.decodes(), 2);
        assert_eq!(app.row_count().await, 1);
    }
}

mod failures {
    use super::*;

    #[tokio::test]
    async fn invalid_size_is_rejected_before_any_work() {
        let app = TestEngine::spawn().await;
        let master = app.master(1, "photo.png", 800, 600).await;

        let result = app.engine.get_rendition(&master, 0).await;

        assert!(matches!(
            result,
            Err(RenditionError::InvalidDimensions { size: 0, .. })
        ));
        assert_eq!(app.codec.decodes(), 0);
        assert_eq!(app.row_count().await, 0);
    }

    #[tokio::test]
    async fn cached_asset_is_served_without_geometry_check() {
        let app = TestEngine::spawn().await;
        let master = app.master(1, "photo.png", 800, 600).await;
        let cached = app.engine.small(&master).await.unwrap().unwrap();

        let unsized_master = StoredMaster::new(
            1,
            master.key().clone(),
            0,
            0,
            master.modified_at(),
            app.store.clone(),
        );

        let served = app.engine.small(&unsized_master).await.unwrap().unwrap();
        assert_eq!(served.id, cached.id);

        // A miss still fails loudly.
        assert!(matches!(
            app.engine.tiny(&unsized_master).await,
            Err(RenditionError::InvalidDimensions { width: 0, height: 0, size: 64 })
        ));
        assert_eq!(app.codec.decodes(), 1);
    }

    #[tokio::test]
    async fn zero_area_geometry_yields_nothing() {
        let app = TestEngine::spawn().await;
        let master = app.master(1, "line.png", 1000, 1).await;

        let result = app.engine.tiny(&master).await.unwrap();

        assert!(result.is_none());
        assert_eq!(app.codec.decodes(), 0);
        assert_eq!(app.row_count().await, 0);
        assert!(app.events.events().contains(&RenditionEvent::Degenerate {
            key: rendition::AssetKey::new(1, 64),
            width: 64,
            height: 0,
        }));
    }

    #[tokio::test]
    async fn undecodable_master_yields_nothing() {
        let app = TestEngine::spawn().await;
        let key = ObjectKey::parse("pictures/9/broken.png").unwrap();
        app.store.put(&key, b"definitely not an image").await.unwrap();
        let master = StoredMaster::new(9, key, 640, 480, Utc::now(), app.store.clone());

        let result = app.engine.large(&master).await.unwrap();

        assert!(result.is_none());
        assert_eq!(app.codec.decodes(), 1);
        assert_eq!(app.row_count().await, 0);
        assert_eq!(
            app.events
                .count(|e| matches!(e, RenditionEvent::SourceUnavailable { .. })),
            1
        );
    }

    #[tokio::test]
    async fn missing_master_bytes_yield_nothing() {
        let app = TestEngine::spawn().await;
        let master = StoredMaster::new(
            9,
            ObjectKey::parse("pictures/9/gone.png").unwrap(),
            640,
            480,
            Utc::now(),
            app.store.clone(),
        );

        assert!(app.engine.large(&master).await.unwrap().is_none());
        assert_eq!(app.codec.decodes(), 0);
        assert_eq!(app.row_count().await, 0);
    }

    #[tokio::test]
    async fn blob_store_failure_is_a_persistence_error() {
        let app = TestEngine::builder().max_blob_size(16).spawn().await;

        // Masters live in a store without the tiny limit.
        let dir = tempfile::tempdir().unwrap();
        let masters: Arc<dyn BlobStore> = Arc::new(
            FilesystemBlobStore::new(dir.path().join("masters"), "/masters", 1024 * 1024)
                .await
                .unwrap(),
        );
        let master = StoredMaster::upload(masters, &ImageOptions::default(), 1, "photo.png", &png(200, 200))
            .await
            .unwrap();

        let result = app.engine.small(&master).await;

        assert!(matches!(
            result,
            Err(RenditionError::Persistence(RepositoryError::Storage(
                StorageError::SizeLimitExceeded { .. }
            )))
        ));
        assert_eq!(app.row_count().await, 0);
    }

    #[tokio::test]
    async fn slow_regeneration_times_out_without_a_record() {
        let app = TestEngine::builder()
            .codec_delay(Duration::from_millis(300))
            .spawn()
            .await;
        let master = app.master(1, "photo.png", 400, 300).await;

        let result = app
            .engine
            .get_rendition_with_timeout(&master, 64, Duration::from_millis(20))
            .await;

        assert!(matches!(result, Err(RenditionError::Timeout(_))));

        // Let the abandoned codec work finish; it must not persist anything.
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(app.row_count().await, 0);

        let asset = app.engine.tiny(&master).await.unwrap().unwrap();
        assert_eq!((asset.width, asset.height), (64, 48));
    }
}

mod concurrency {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_misses_render_once() {
        let app = TestEngine::builder()
            .codec_delay(Duration::from_millis(50))
            .spawn()
            .await;
        let master = app.master(1, "photo.png", 800, 600).await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let engine = app.engine.clone();
            let master = master.clone();
            handles.push(tokio::spawn(async move {
                engine.large(&master).await.unwrap().unwrap()
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().id);
        }

        assert!(ids.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(app.codec.decodes(), 1);
        assert_eq!(app.row_count().await, 1);
        assert_eq!(
            app.events
                .count(|e| matches!(e, RenditionEvent::Regenerated { .. })),
            1
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn different_sizes_regenerate_in_parallel() {
        let app = TestEngine::spawn().await;
        let master = app.master(1, "photo.png", 800, 600).await;

        let (tiny, huge) = tokio::join!(app.engine.tiny(&master), app.engine.huge(&master));

        assert_eq!(tiny.unwrap().unwrap().size, 64);
        assert_eq!(huge.unwrap().unwrap().size, 384);
        assert_eq!(app.row_count().await, 2);
    }
}
