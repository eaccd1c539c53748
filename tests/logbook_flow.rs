//! End-to-end flows through the logbook facade

use chrono::NaiveDate;
use tempfile::tempdir;
use trainlog::index::LogIndex;
use trainlog::records::PersonalBestState;
use trainlog::storage::parse_date;
use trainlog::{
    DateRange, Entry, Event, Logbook, PersonalBest, SearchFilter, SortOrder, StaticTime, Trend,
};

const SHEET: &str = "date,type,location,duration,content
2026-02-01,pool,Jing'an,120,DYN 4x50
2026-02-02,land,home,45,CO2 table
not-a-date,pool,Jing'an,90,broken
2026-02-04,STA,home,30,static 5:30
2026-02-05,pool,Oriental,100,DYNB 150m
2026-02-06,land,gym,60,yoga
2026-02-07,pool,Jing'an,110,DNF 100m
2026/13/45,pool,home,10,also broken
2026-02-09,rest,home,,recovery walk
02/10/2026,pool,Jing'an,95,DYN 200m";

fn day(s: &str) -> NaiveDate {
    parse_date(s).unwrap()
}

fn imported_book() -> (tempfile::TempDir, Logbook) {
    let dir = tempdir().unwrap();
    let sheet = dir.path().join("log.csv");
    std::fs::write(&sheet, SHEET).unwrap();

    let book = Logbook::open_dir(&dir.path().join("data")).unwrap();
    let report = book.import_spreadsheet(&sheet).unwrap();
    assert_eq!(report.imported, 8);
    assert_eq!(report.skipped.len(), 2);
    (dir, book)
}

#[test]
fn test_import_then_search_week_ascending() {
    let (_dir, book) = imported_book();

    let filter = SearchFilter::new().date_range(DateRange::parse("2026-02-01", "2026-02-07").unwrap());
    let dates: Vec<NaiveDate> = book
        .search(&filter, SortOrder::Ascending)
        .unwrap()
        .into_iter()
        .map(|e| e.date)
        .collect();

    assert_eq!(
        dates,
        vec![
            day("2026-02-01"),
            day("2026-02-02"),
            day("2026-02-04"),
            day("2026-02-05"),
            day("2026-02-06"),
            day("2026-02-07"),
        ]
    );

    let pool_in_jingan = book
        .search(
            &SearchFilter::new().training_type("pool").location("Jing'an"),
            SortOrder::Descending,
        )
        .unwrap();
    assert_eq!(pool_in_jingan.len(), 3);
    assert_eq!(pool_in_jingan[0].date, day("2026-02-10"));
}

#[test]
fn test_overwrite_leaves_no_stale_buckets() {
    let (_dir, book) = imported_book();
    let date = day("2026-02-05");

    book.add(Entry::new(date, "STA", "home").duration(20.0), true)
        .unwrap();

    let index = book.store().index();
    assert!(!index.dates_for_type("pool").unwrap().contains(&date));
    assert!(!index.dates_for_location("Oriental").unwrap().contains(&date));
    assert!(index.dates_for_type("STA").unwrap().contains(&date));
    assert!(!index.locations().unwrap().contains(&"Oriental".to_string()));
}

#[test]
fn test_rebuild_matches_incremental_index() {
    let (dir, book) = imported_book();
    book.add(Entry::new(day("2026-02-06"), "pool", "Jing'an"), true)
        .unwrap();

    let incremental = book.store().index_snapshot().unwrap();
    let entries = book.store().all().unwrap();
    let fresh = LogIndex::build(&entries);
    assert_eq!(*incremental, fresh);

    book.rebuild_index().unwrap();
    assert_eq!(*book.store().index_snapshot().unwrap(), fresh);

    // A reopened logbook sees the same index
    drop(book);
    let reopened = Logbook::open_dir(&dir.path().join("data")).unwrap();
    assert_eq!(*reopened.store().index_snapshot().unwrap(), fresh);
}

#[test]
fn test_personal_best_monotonic() {
    let dir = tempdir().unwrap();
    let book = Logbook::open_dir(dir.path()).unwrap();

    let mut seeded = PersonalBestState::default();
    seeded.set(Event::Dyn, PersonalBest::distance(319, None, None));
    seeded.set(Event::Sta, PersonalBest::time(StaticTime::from_seconds(548), None, None));
    book.personal_bests().replace(seeded).unwrap();

    let date = day("2026-02-04");
    let worse = book.update_personal_best("DYN", "250", date, "Jing'an").unwrap();
    assert!(!worse.improved);
    assert_eq!(worse.record.score(), 319);
    assert_eq!(worse.record.date(), None);

    let better = book.update_personal_best("sta", "9:10", date, "home").unwrap();
    assert!(better.improved);
    assert_eq!(better.record.score(), 550);
    assert_eq!(better.record.display_value(), "9:10");
    assert_eq!(better.record.location(), Some("home"));

    assert!(book
        .update_personal_best("FIM", "30", date, "")
        .is_err());
}

#[test]
fn test_empty_window_statistics() {
    let (_dir, book) = imported_book();

    let summary = book
        .summarize(DateRange::parse("2025-06-01", "2025-06-30").unwrap())
        .unwrap();
    assert_eq!(summary.total_entries, 0);
    assert_eq!(summary.lung_capacity.trend, Trend::InsufficientData);
    assert_eq!(summary.lung_capacity.trend.to_string(), "insufficient data");

    let feb = book.summarize(DateRange::month(2026, 2).unwrap()).unwrap();
    assert_eq!(feb.total_entries, 8);
    assert_eq!(feb.by_type["pool"], 4);
}

#[test]
fn test_lung_capacity_best_tracks_maximum() {
    let dir = tempdir().unwrap();
    let book = Logbook::open_dir(dir.path()).unwrap();

    book.add_lung_capacity(day("2026-02-01"), &[6428, 6462, 6632], "")
        .unwrap();
    book.add_lung_capacity(day("2026-02-02"), &[6500, -3, 0], "tired")
        .unwrap();

    assert_eq!(
        book.lung_capacity().personal_best().unwrap(),
        (6632, Some(day("2026-02-01")))
    );
    assert!(book.add_lung_capacity(day("2026-02-03"), &[0, -1], "").is_err());
}
