use std::cell::RefCell;
use std::rc::Rc;

use chrono::{Local, NaiveDate};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use super::catalog::{Catalog, ImageOptions};
use crate::error::{Error, Result};
use crate::state::data::{BackgroundRecord, BACKGROUND_KEY};
use crate::state::storage::Storage;

/// Source of "today".
pub trait Clock {
    fn today(&self) -> NaiveDate;
}

/// Local wall-clock calendar day.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalClock;

impl Clock for LocalClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Picks the background photo of the day and remembers it in storage.
///
/// The stored record is either fresh (written today), in which case its
/// photo is returned as is, or stale/missing, in which case a new photo is
/// picked and the record replaced.
pub struct BackgroundSelector {
    storage: Rc<dyn Storage>,
    catalog: Catalog,
    options: ImageOptions,
    clock: Box<dyn Clock>,
    rng: RefCell<StdRng>,
}

impl BackgroundSelector {
    /// Selector over the built-in catalog, using the local clock.
    pub fn new(storage: Rc<dyn Storage>) -> Self {
        Self {
            storage,
            catalog: Catalog::builtin(),
            options: ImageOptions::default(),
            clock: Box::new(LocalClock),
            rng: RefCell::new(StdRng::from_entropy()),
        }
    }

    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_options(mut self, options: ImageOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = RefCell::new(rng);
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn options(&self) -> ImageOptions {
        self.options
    }

    /// URL of today's background.
    ///
    /// Returns the stored photo if it was picked today, otherwise refreshes.
    /// At most one write per day.
    pub fn daily_background(&self) -> Result<String> {
        let today = self.clock.today();

        if let Some(record) = self.stored_record()? {
            // A photo dropped from the catalog is treated like a stale record
            if record.is_fresh(today) && self.catalog.contains(&record.photo_id) {
                debug!(photo_id = %record.photo_id, "background still fresh");
                return Ok(self.options.url(&record.photo_id));
            }
        }

        self.refresh_background()
    }

    /// Pick a new photo for today, different from the current one, and
    /// store it. Always writes.
    ///
    /// # Errors
    ///
    /// * [`Error::CatalogExhausted`] if the catalog is empty
    /// * [`Error::StorageUnavailable`] if the record cannot be read or written
    pub fn refresh_background(&self) -> Result<String> {
        let today = self.clock.today();
        let current = self.stored_record()?;
        let current_id = current.as_ref().map(|r| r.photo_id.clone());

        let picked = {
            let candidates = self.catalog.candidates(current_id.as_deref());
            let mut rng = self.rng.borrow_mut();
            candidates.choose(&mut *rng).map(|id| id.to_string())
        };

        let record = match picked {
            Some(photo_id) => BackgroundRecord {
                date: today,
                photo_id,
                previous_photo_id: current_id,
            },
            None => self.keep_current(today, current)?,
        };

        self.store_record(&record)?;
        info!(
            "🖼️  New background for {}: {}",
            record.date, record.photo_id
        );

        Ok(self.options.url(&record.photo_id))
    }

    /// The stored record, if any.
    ///
    /// A record that doesn't parse is logged and reported as missing, so the
    /// next refresh overwrites it.
    pub fn stored_record(&self) -> Result<Option<BackgroundRecord>> {
        let Some(raw) = self.storage.get_item(BACKGROUND_KEY)? else {
            return Ok(None);
        };

        match BackgroundRecord::from_json(&raw) {
            Ok(record) => Ok(Some(record)),
            Err(source) => {
                let err = Error::StorageCorruption {
                    key: BACKGROUND_KEY.to_string(),
                    source,
                };
                warn!(%err, "⚠️  discarding background record");
                Ok(None)
            }
        }
    }

    /// Fallback when there is nothing else to pick: the current photo stays,
    /// re-dated to today.
    fn keep_current(
        &self,
        today: NaiveDate,
        current: Option<BackgroundRecord>,
    ) -> Result<BackgroundRecord> {
        match current {
            Some(record) if self.catalog.contains(&record.photo_id) => {
                warn!(photo_id = %record.photo_id, "no other photo to pick, keeping the current one");
                let previous_photo_id = record
                    .previous_photo_id
                    .filter(|previous| *previous != record.photo_id);
                Ok(BackgroundRecord {
                    date: today,
                    photo_id: record.photo_id,
                    previous_photo_id,
                })
            }
            _ => Err(Error::CatalogExhausted),
        }
    }

    fn store_record(&self, record: &BackgroundRecord) -> Result<()> {
        let json = record.to_json().map_err(|source| Error::Serialize {
            key: BACKGROUND_KEY.to_string(),
            source,
        })?;
        self.storage.set_item(BACKGROUND_KEY, &json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::storage::MemoryStorage;
    use std::cell::Cell;

    /// A clock the test can move forward.
    #[derive(Clone)]
    struct TestClock(Rc<Cell<NaiveDate>>);

    impl TestClock {
        fn at(date: NaiveDate) -> Self {
            Self(Rc::new(Cell::new(date)))
        }

        fn advance_days(&self, days: u64) {
            let next = self.0.get() + chrono::Days::new(days);
            self.0.set(next);
        }
    }

    impl Clock for TestClock {
        fn today(&self) -> NaiveDate {
            self.0.get()
        }
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn selector(storage: &Rc<MemoryStorage>, clock: &TestClock) -> BackgroundSelector {
        BackgroundSelector::new(storage.clone())
            .with_clock(clock.clone())
            .with_rng(StdRng::seed_from_u64(7))
    }

    fn store(storage: &MemoryStorage, record: &BackgroundRecord) {
        storage
            .set_item(BACKGROUND_KEY, &record.to_json().unwrap())
            .unwrap();
    }

    fn stored(storage: &MemoryStorage) -> BackgroundRecord {
        let raw = storage.get_item(BACKGROUND_KEY).unwrap().unwrap();
        BackgroundRecord::from_json(&raw).unwrap()
    }

    #[test]
    fn test_first_run_creates_record() {
        let storage = Rc::new(MemoryStorage::new());
        let clock = TestClock::at(day(2026, 10, 16));
        let selector = selector(&storage, &clock);

        let url = selector.daily_background().unwrap();

        let record = stored(&storage);
        assert_eq!(record.date, day(2026, 10, 16));
        assert_eq!(record.previous_photo_id, None);
        assert!(selector.catalog().contains(&record.photo_id));
        assert_eq!(url, ImageOptions::default().url(&record.photo_id));
    }

    #[test]
    fn test_same_day_is_idempotent() {
        let storage = Rc::new(MemoryStorage::new());
        let clock = TestClock::at(day(2026, 10, 16));
        let selector = selector(&storage, &clock);

        let first = selector.daily_background().unwrap();
        let second = selector.daily_background().unwrap();

        assert_eq!(first, second);
        assert_eq!(storage.write_count(), 1);
    }

    #[test]
    fn test_day_rollover_refreshes_once() {
        let storage = Rc::new(MemoryStorage::new());
        let clock = TestClock::at(day(2026, 10, 16));
        let yesterday = BackgroundRecord {
            date: day(2026, 10, 15),
            photo_id: "1542676032-6e468ada2953".to_string(),
            previous_photo_id: None,
        };
        store(&storage, &yesterday);
        let selector = selector(&storage, &clock);

        selector.daily_background().unwrap();
        selector.daily_background().unwrap();

        let record = stored(&storage);
        assert_eq!(record.date, day(2026, 10, 16));
        assert_ne!(record.photo_id, yesterday.photo_id);
        assert_eq!(record.previous_photo_id, Some(yesterday.photo_id));
        // One write to seed the test, one refresh
        assert_eq!(storage.write_count(), 2);
    }

    #[test]
    fn test_next_day_picks_again() {
        let storage = Rc::new(MemoryStorage::new());
        let clock = TestClock::at(day(2026, 12, 31));
        let selector = selector(&storage, &clock);

        selector.daily_background().unwrap();
        let before = stored(&storage);

        clock.advance_days(1);
        selector.daily_background().unwrap();
        let after = stored(&storage);

        assert_eq!(after.date, day(2027, 1, 1));
        assert_ne!(after.photo_id, before.photo_id);
        assert_eq!(after.previous_photo_id, Some(before.photo_id));
    }

    #[test]
    fn test_refresh_never_repeats_current() {
        let storage = Rc::new(MemoryStorage::new());
        let clock = TestClock::at(day(2026, 10, 16));
        let selector = selector(&storage, &clock);

        let ids: Vec<String> = selector.catalog().iter().map(str::to_string).collect();
        for photo_id in ids {
            store(
                &storage,
                &BackgroundRecord {
                    date: day(2026, 10, 16),
                    photo_id: photo_id.clone(),
                    previous_photo_id: None,
                },
            );

            selector.refresh_background().unwrap();

            let record = stored(&storage);
            assert_ne!(record.photo_id, photo_id);
            assert_eq!(record.previous_photo_id, Some(photo_id));
        }
    }

    #[test]
    fn test_two_photos_alternate() {
        let storage = Rc::new(MemoryStorage::new());
        let clock = TestClock::at(day(2026, 10, 16));
        let selector = selector(&storage, &clock).with_catalog(Catalog::new(["a", "b"]));

        let first = selector.refresh_background().unwrap();
        let second = selector.refresh_background().unwrap();
        let third = selector.refresh_background().unwrap();

        assert_ne!(first, second);
        assert_eq!(first, third);
    }

    #[test]
    fn test_single_photo_catalog_keeps_current() {
        let storage = Rc::new(MemoryStorage::new());
        let clock = TestClock::at(day(2026, 10, 16));
        store(
            &storage,
            &BackgroundRecord {
                date: day(2026, 10, 15),
                photo_id: "only".to_string(),
                previous_photo_id: Some("only".to_string()),
            },
        );
        let selector = selector(&storage, &clock).with_catalog(Catalog::new(["only"]));

        let url = selector.daily_background().unwrap();

        let record = stored(&storage);
        assert_eq!(url, ImageOptions::default().url("only"));
        assert_eq!(record.photo_id, "only");
        assert_eq!(record.date, day(2026, 10, 16));
        assert_eq!(record.previous_photo_id, None);
    }

    #[test]
    fn test_single_photo_catalog_first_run_picks_it() {
        let storage = Rc::new(MemoryStorage::new());
        let clock = TestClock::at(day(2026, 10, 16));
        let selector = selector(&storage, &clock).with_catalog(Catalog::new(["only"]));

        selector.daily_background().unwrap();
        assert_eq!(stored(&storage).photo_id, "only");
    }

    #[test]
    fn test_empty_catalog_is_exhausted() {
        let storage = Rc::new(MemoryStorage::new());
        let clock = TestClock::at(day(2026, 10, 16));
        let selector = selector(&storage, &clock).with_catalog(Catalog::new(Vec::<String>::new()));

        let err = selector.refresh_background().unwrap_err();
        assert!(matches!(err, Error::CatalogExhausted));
        assert_eq!(storage.write_count(), 0);
    }

    #[test]
    fn test_corrupt_record_is_replaced() {
        let storage = Rc::new(MemoryStorage::new());
        let clock = TestClock::at(day(2026, 10, 16));
        storage.set_item(BACKGROUND_KEY, "{broken").unwrap();
        let selector = selector(&storage, &clock);

        assert_eq!(selector.stored_record().unwrap(), None);
        selector.daily_background().unwrap();

        let record = stored(&storage);
        assert_eq!(record.date, day(2026, 10, 16));
        assert_eq!(record.previous_photo_id, None);
    }

    #[test]
    fn test_unknown_photo_is_replaced_even_if_fresh() {
        let storage = Rc::new(MemoryStorage::new());
        let clock = TestClock::at(day(2026, 10, 16));
        store(
            &storage,
            &BackgroundRecord {
                date: day(2026, 10, 16),
                photo_id: "retired-photo".to_string(),
                previous_photo_id: None,
            },
        );
        let selector = selector(&storage, &clock);

        selector.daily_background().unwrap();

        let record = stored(&storage);
        assert!(selector.catalog().contains(&record.photo_id));
        assert_eq!(record.previous_photo_id.as_deref(), Some("retired-photo"));
    }

    #[test]
    fn test_custom_image_options() {
        let storage = Rc::new(MemoryStorage::new());
        let clock = TestClock::at(day(2026, 10, 16));
        let options = ImageOptions {
            width: 1920,
            quality: 80,
        };
        let selector = selector(&storage, &clock)
            .with_catalog(Catalog::new(["a"]))
            .with_options(options);

        assert_eq!(
            selector.daily_background().unwrap(),
            "https://images.unsplash.com/photo-a?w=1920&q=80"
        );
        assert_eq!(selector.options(), options);
    }
}
