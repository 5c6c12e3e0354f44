// ==============================================
// RESOURCE MANAGER LIFECYCLE TESTS (integration)
// ==============================================
//
// Request/free balancing, permanent images, configuration-driven cache
// creation and the direct-to-cached switch, seen through the manager.

use imgcache::backend::{BackendCall, MemoryBackend};
use imgcache::config::CacheConfigFile;
use imgcache::error::{CacheError, ResourceError};
use imgcache::image::{ImageId, ImageInfo, PixelFormat};
use imgcache::policy::ReplacementPolicyKind;
use imgcache::resource::{PrefetchStep, ResourceManager};
use proptest::prelude::*;

fn backend() -> MemoryBackend {
    let mut backend = MemoryBackend::new();
    backend.add_image("wallpaper.png", ImageInfo::new(100, 10, PixelFormat::A8));
    backend.add_image("icon.png", ImageInfo::new(10, 10, PixelFormat::A8));
    backend.add_image("button.png", ImageInfo::new(20, 10, PixelFormat::A8));
    backend.add_image("photo.png", ImageInfo::new(50, 10, PixelFormat::A8));
    backend
}

const CONFIG: &str = r#"
<CacheConfig>
    <FileVersion>1</FileVersion>
    <Entries>1</Entries>
    <ImageCacheConfig>
        <Resolution>800x480</Resolution>
        <CacheSize>1300</CacheSize>
        <ReplacementFree>2</ReplacementFree>
        <ReplacementUsed>3</ReplacementUsed>
    </ImageCacheConfig>
</CacheConfig>
"#;

fn configured_manager() -> ResourceManager<MemoryBackend> {
    let config = CacheConfigFile::parse(CONFIG).unwrap();
    let settings = *config.select(800, 480, None).unwrap();
    let mut rm = ResourceManager::new(backend());
    assert!(rm.create_image_cache(settings.size_limit, settings.used_policy, settings.free_policy));
    rm
}

// ==============================================
// Configuration-driven cache
// ==============================================

#[test]
fn config_selects_cache_settings() {
    let rm = configured_manager();
    let cache = rm.image_cache().unwrap();
    assert_eq!(cache.cache_size_limit(), 1300);
    assert_eq!(cache.free_policy_kind(), ReplacementPolicyKind::Fifo);
    assert_eq!(cache.used_policy_kind(), ReplacementPolicyKind::Lru);
}

// ==============================================
// Permanent images and the free list
// ==============================================

#[test]
fn permanent_images_are_retained_until_space_is_needed() {
    let mut rm = configured_manager();
    rm.register_image_resource("wallpaper.png", ImageId(1), true);
    rm.register_image_resource("icon.png", ImageId(2), true);
    rm.register_image_resource("button.png", ImageId(3), false);
    rm.register_image_resource("photo.png", ImageId(4), false);

    for id in [1, 2, 3] {
        rm.request_image_resource(ImageId(id)).unwrap();
    }
    for id in [1, 2, 3] {
        rm.free_image_resource(ImageId(id)).unwrap();
    }
    // Permanent images stay resident in the free list, the rest is gone.
    let cache = rm.image_cache().unwrap();
    assert!(cache.is_free(ImageId(1)));
    assert!(cache.is_free(ImageId(2)));
    assert!(!cache.contains(ImageId(3)));
    assert_eq!(cache.current_memory_usage(), 1100);

    // 300 bytes short: FIFO evicts the wallpaper, which was freed first.
    rm.request_image_resource(ImageId(4)).unwrap();
    let cache = rm.image_cache().unwrap();
    assert!(!cache.contains(ImageId(1)));
    assert!(cache.is_free(ImageId(2)));
    assert!(cache.is_used(ImageId(4)));

    // The wallpaper no longer fits next to the photo; the icon is evicted
    // on the way and not restored.
    let err = rm.request_image_resource(ImageId(1)).unwrap_err();
    assert!(matches!(err, ResourceError::Cache(CacheError::BudgetExceeded { .. })));
    assert!(!rm.image_cache().unwrap().contains(ImageId(2)));

    rm.free_image_resource(ImageId(4)).unwrap();
    rm.free_image_resource(ImageId(1)).unwrap();
    rm.request_image_resource(ImageId(1)).unwrap();
    assert!(rm.image_cache().unwrap().is_used(ImageId(1)));
}

#[test]
fn direct_mode_then_cache_switch() {
    let mut rm = ResourceManager::new(backend());
    rm.register_image_resource("icon.png", ImageId(2), false);
    rm.request_image_resource(ImageId(2)).unwrap();
    assert_eq!(
        rm.backend().unwrap().calls(),
        &[BackendCall::Load(ImageId(2))]
    );

    assert!(rm.create_image_cache(500, ReplacementPolicyKind::Lru, ReplacementPolicyKind::Lru));
    assert!(rm.image_cache().unwrap().is_used(ImageId(2)));

    rm.free_image_resource(ImageId(2)).unwrap();
    assert!(!rm.is_loaded(ImageId(2)));
    assert_eq!(rm.backend().unwrap().load_calls(), 1);
}

#[test]
fn prefetched_images_become_used_without_reload() {
    let mut rm = configured_manager();
    rm.register_image_resource("photo.png", ImageId(4), false);
    rm.add_to_prefetch_queue(ImageId(4));
    assert_eq!(rm.prefetch_now().step, Some(PrefetchStep::Loaded(ImageId(4))));

    rm.request_image_resource(ImageId(4)).unwrap();
    assert!(rm.image_cache().unwrap().is_used(ImageId(4)));
    assert_eq!(rm.backend().unwrap().load_calls(), 1);
}

// ==============================================
// Request/free balancing
// ==============================================

proptest! {
    #[test]
    #[cfg_attr(miri, ignore)]
    fn balanced_requests_leave_nothing_used(
        counts in prop::collection::vec(0u32..4, 4),
    ) {
        let mut rm = configured_manager();
        let paths = ["wallpaper.png", "icon.png", "button.png", "photo.png"];
        for (raw, path) in paths.iter().enumerate() {
            rm.register_image_resource(*path, ImageId(raw as u32), raw % 2 == 0);
        }

        for (raw, &count) in counts.iter().enumerate() {
            for _ in 0..count {
                let _ = rm.request_image_resource(ImageId(raw as u32));
            }
        }
        for (raw, &count) in counts.iter().enumerate() {
            for _ in 0..count {
                prop_assert!(rm.free_image_resource(ImageId(raw as u32)).is_ok());
            }
            prop_assert_eq!(rm.image_request_count(ImageId(raw as u32)), Some(0));
        }

        let cache = rm.image_cache().unwrap();
        prop_assert!(cache.used_ids().is_empty());
        prop_assert!(cache.check_invariants().is_ok());
        for raw in [1u32, 3] {
            prop_assert!(!cache.contains(ImageId(raw)));
        }
    }
}
