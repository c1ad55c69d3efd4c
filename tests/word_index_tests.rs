//! Faceted word index, groups, coordinate pagination, and TF-IDF ranking
//! through the public store API.

use chrono::NaiveDate;
use rfcindex::{
    AbsoluteQuery, CorpusError, CorpusStore, DocumentMeta, RelativeQuery, SearchQuery,
    SortBy, SortOrder, WordQuery,
};

fn meta(num: i64, title: &str, authors: &[&str], date: (i32, u32, u32)) -> DocumentMeta {
    DocumentMeta {
        num,
        title: title.to_string(),
        published_at: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
        authors: authors.iter().map(|a| a.to_string()).collect(),
    }
}

fn ranking_store() -> CorpusStore {
    let store = CorpusStore::open_in_memory().unwrap();
    store
        .ingest(
            &meta(1, "Routing Tables", &["A. Alpha", "B. Beta"], (1980, 1, 1)),
            "routing table routing common\n",
        )
        .unwrap();
    store
        .ingest(
            &meta(2, "Routing Protocol", &["A. Alpha"], (1981, 6, 1)),
            "routing protocol common\n",
        )
        .unwrap();
    store
        .ingest(
            &meta(3, "Unrelated Memo", &["C. Gamma"], (1982, 3, 1)),
            "entirely different words common\n",
        )
        .unwrap();
    store
}

// ─────────────────────────────────────────────────────────────────────────────
// Ranked search
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn tfidf_ranks_higher_term_frequency_first() {
    let store = ranking_store();
    let results = store
        .search(&SearchQuery {
            tokens: Some(vec!["routing".into()]),
            ..Default::default()
        })
        .unwrap();

    // Document 3 has no "routing" and must be excluded.
    let nums: Vec<i64> = results.iter().map(|r| r.meta.num).collect();
    assert_eq!(nums, vec![1, 2]);
    assert!(results[0].rank.unwrap() > results[1].rank.unwrap());
}

#[test]
fn token_present_in_every_document_contributes_zero() {
    let store = ranking_store();
    let results = store
        .search(&SearchQuery {
            tokens: Some(vec!["common".into()]),
            ..Default::default()
        })
        .unwrap();

    // ln(N/N) = 0: every document matches with a zero score, ties broken by
    // document number.
    assert_eq!(results.len(), 3);
    let nums: Vec<i64> = results.iter().map(|r| r.meta.num).collect();
    assert_eq!(nums, vec![1, 2, 3]);
    for result in &results {
        assert_eq!(result.rank.unwrap(), 0.0);
    }
}

#[test]
fn query_tokens_match_by_stem() {
    let store = ranking_store();
    // "tables" stems to the same root as the indexed "table".
    let results = store
        .search(&SearchQuery {
            tokens: Some(vec!["tables".into()]),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].meta.num, 1);
}

#[test]
fn search_without_tokens_orders_by_date_desc() {
    let store = ranking_store();
    let results = store.search(&SearchQuery::default()).unwrap();
    let nums: Vec<i64> = results.iter().map(|r| r.meta.num).collect();
    assert_eq!(nums, vec![3, 2, 1]);
    assert!(results.iter().all(|r| r.rank.is_none()));
}

#[test]
fn metadata_filters_combine_with_and() {
    let store = ranking_store();

    let by_title = store
        .search(&SearchQuery { title: Some("routing".into()), ..Default::default() })
        .unwrap();
    assert_eq!(by_title.len(), 2);

    // Both filter authors must match, each against at least one author.
    let both_authors = store
        .search(&SearchQuery {
            authors: Some(vec!["Alpha".into(), "Beta".into()]),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(both_authors.len(), 1);
    assert_eq!(both_authors[0].meta.num, 1);

    let in_range = store
        .search(&SearchQuery {
            date_range: Some((
                NaiveDate::from_ymd_opt(1981, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(1982, 12, 31).unwrap(),
            )),
            ..Default::default()
        })
        .unwrap();
    let nums: Vec<i64> = in_range.iter().map(|r| r.meta.num).collect();
    assert_eq!(nums, vec![3, 2]);

    let by_num = store
        .search(&SearchQuery { num: Some(2), ..Default::default() })
        .unwrap();
    assert_eq!(by_num.len(), 1);
    assert_eq!(by_num[0].meta.title, "Routing Protocol");
}

#[test]
fn search_with_no_matches_is_empty_not_error() {
    let store = ranking_store();
    let results = store
        .search(&SearchQuery { title: Some("no such title".into()), ..Default::default() })
        .unwrap();
    assert!(results.is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Word index
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn query_words_partial_matches_surface_or_stem() {
    let store = ranking_store();
    let page = store
        .query_words(&WordQuery { partial: Some("rout".into()), ..Default::default() })
        .unwrap();
    let tokens: Vec<&str> = page.results.iter().map(|w| w.token.as_str()).collect();
    assert_eq!(tokens, vec!["routing"]);
    // Summed over both documents containing it.
    assert_eq!(page.results[0].count, 3);
}

#[test]
fn query_words_title_filter_limits_count_to_matching_documents() {
    let store = ranking_store();
    let page = store
        .query_words(&WordQuery {
            partial: Some("common".into()),
            title: Some("routing tables".into()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(page.results.len(), 1);
    assert_eq!(page.results[0].count, 1);
}

#[test]
fn query_words_sorts_by_count_desc() {
    let store = ranking_store();
    let page = store
        .query_words(&WordQuery {
            sort_by: SortBy::Occurrences,
            sort_order: SortOrder::Desc,
            ..Default::default()
        })
        .unwrap();
    assert!(page.results.len() >= 2);
    for pair in page.results.windows(2) {
        assert!(pair[0].count >= pair[1].count);
    }
    // "common" (3) and "routing" (3) lead the board.
    assert_eq!(page.results[0].count, 3);
}

#[test]
fn query_words_pagination_totals_are_invariant() {
    let store = ranking_store();

    let full = store
        .query_words(&WordQuery { page_size: 1000, ..Default::default() })
        .unwrap();
    let total = full.total_count;
    assert_eq!(full.results.len() as i64, total);

    let mut seen = 0i64;
    let page_size = 3i64;
    let mut page_num = 1i64;
    loop {
        let page = store
            .query_words(&WordQuery {
                page: page_num,
                page_size,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(page.total_count, total);
        assert_eq!(page.total_pages, (total + page_size - 1) / page_size);
        if page.results.is_empty() {
            break;
        }
        seen += page.results.len() as i64;
        page_num += 1;
    }
    assert_eq!(seen, total);
}

#[test]
fn query_words_group_filter() {
    let store = ranking_store();
    store
        .create_group("nouns", &["table".to_string(), "protocol".to_string()])
        .unwrap();

    let page = store
        .query_words(&WordQuery {
            groups: Some(vec!["nouns".into()]),
            ..Default::default()
        })
        .unwrap();
    let mut tokens: Vec<&str> = page.results.iter().map(|w| w.token.as_str()).collect();
    tokens.sort();
    assert_eq!(tokens, vec!["protocol", "table"]);
}

#[test]
fn document_occurrences_and_drilldown() {
    let store = ranking_store();

    let per_doc = store.document_occurrences("routing", None).unwrap();
    assert_eq!(per_doc.len(), 2);
    assert_eq!(per_doc[0].num, 1);
    assert_eq!(per_doc[0].count, 2);
    assert_eq!(per_doc[1].num, 2);
    assert_eq!(per_doc[1].count, 1);

    let filtered = store
        .document_occurrences("routing", Some("protocol"))
        .unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].num, 2);

    let occurrences = store.occurrences("routing", 1).unwrap();
    assert_eq!(occurrences.len(), 2);
    // "routing table routing common": occurrences in reading order.
    assert_eq!(occurrences[0].abs.line, 1);
    assert_eq!(occurrences[0].abs.column, 0);
    assert_eq!(occurrences[1].abs.column, 14);
    assert_eq!(occurrences[0].abs.length, 7);
    assert_eq!(occurrences[0].rel.word, 0);
    assert_eq!(occurrences[1].rel.word, 2);
    assert_eq!(occurrences[0].context.content, "routing table routing common");
}

#[test]
fn occurrence_excerpt_brackets_the_token() {
    let store = ranking_store();
    let occurrences = store.occurrences("table", 1).unwrap();
    assert_eq!(occurrences.len(), 1);
    let shortened = occurrences[0].context.shorten(100);
    assert_eq!(shortened, "routing [table] routing common");
}

// ─────────────────────────────────────────────────────────────────────────────
// Groups
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn group_membership_is_idempotent() {
    let store = CorpusStore::open_in_memory().unwrap();
    store.create_group("terms", &[]).unwrap();
    store.add_words("terms", &["gateway".to_string()]).unwrap();
    store.add_words("terms", &["gateway".to_string()]).unwrap();

    assert_eq!(store.list_words("terms").unwrap(), vec!["gateway".to_string()]);
}

#[test]
fn adding_unknown_word_creates_its_token() {
    let store = CorpusStore::open_in_memory().unwrap();
    store.create_group("terms", &["fragmentation".to_string()]).unwrap();

    // The token now exists with a stem even though no document contains it.
    assert_eq!(
        store.list_words("terms").unwrap(),
        vec!["fragmentation".to_string()]
    );
}

#[test]
fn removing_non_member_word_is_a_noop() {
    let store = CorpusStore::open_in_memory().unwrap();
    store.create_group("terms", &["gateway".to_string()]).unwrap();
    store.remove_words("terms", &["never-added".to_string()]).unwrap();
    assert_eq!(store.list_words("terms").unwrap(), vec!["gateway".to_string()]);

    store.remove_words("terms", &["gateway".to_string()]).unwrap();
    assert!(store.list_words("terms").unwrap().is_empty());
}

#[test]
fn group_errors() {
    let store = CorpusStore::open_in_memory().unwrap();
    store.create_group("dup", &[]).unwrap();

    assert!(matches!(
        store.create_group("dup", &[]).unwrap_err(),
        CorpusError::DuplicateGroup(_)
    ));
    assert!(matches!(
        store.add_words("ghost", &["word".to_string()]).unwrap_err(),
        CorpusError::NotFound(_)
    ));
    assert!(matches!(
        store.list_words("ghost").unwrap_err(),
        CorpusError::NotFound(_)
    ));

    assert_eq!(store.list_groups().unwrap(), vec!["dup".to_string()]);
}

// ─────────────────────────────────────────────────────────────────────────────
// Coordinate search
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn absolute_search_column_containment_is_half_open() {
    let store = CorpusStore::open_in_memory().unwrap();
    store
        .ingest(
            &meta(1, "Columns", &["A"], (1980, 1, 1)),
            "  word next\n",
        )
        .unwrap();

    // "word" occupies columns [2, 6); "next" occupies [7, 11).
    let at = |column: i64| {
        store
            .absolute_search(&AbsoluteQuery {
                abs_line: Some(1),
                column: Some(column),
                ..Default::default()
            })
            .unwrap()
    };

    assert_eq!(at(2).results[0].word, "word");
    assert_eq!(at(5).results[0].word, "word");
    assert!(at(6).results.is_empty());
    assert_eq!(at(7).results[0].word, "next");
}

#[test]
fn absolute_search_without_column_returns_whole_line() {
    let store = CorpusStore::open_in_memory().unwrap();
    store
        .ingest(
            &meta(1, "Lines", &["A"], (1980, 1, 1)),
            "first line\nsecond line here\n",
        )
        .unwrap();

    let page = store
        .absolute_search(&AbsoluteQuery { abs_line: Some(2), ..Default::default() })
        .unwrap();
    let words: Vec<&str> = page.results.iter().map(|r| r.word.as_str()).collect();
    assert_eq!(words, vec!["second", "line", "here"]);
}

#[test]
fn relative_search_addresses_section_line_word() {
    let store = CorpusStore::open_in_memory().unwrap();
    store
        .ingest(
            &meta(1, "Relative", &["A"], (1980, 1, 1)),
            "intro words\n\nbody first line\nbody second line\n",
        )
        .unwrap();

    let page = store
        .relative_search(&RelativeQuery {
            section: Some(1),
            line_in_section: Some(1),
            word_in_line: Some(2),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(page.total_count, 1);
    assert_eq!(page.results[0].word, "line");
    assert_eq!(page.results[0].abs_line, 4);
}

#[test]
fn coordinate_pagination_totals_are_invariant() {
    let store = CorpusStore::open_in_memory().unwrap();
    store
        .ingest(
            &meta(1, "Paging", &["A"], (1980, 1, 1)),
            "one two three four five six seven\n",
        )
        .unwrap();

    let all = store
        .absolute_search(&AbsoluteQuery { abs_line: Some(1), ..Default::default() })
        .unwrap();
    assert_eq!(all.total_count, 7);

    let mut seen = 0;
    for page_num in 1..=4 {
        let page = store
            .absolute_search(&AbsoluteQuery {
                abs_line: Some(1),
                page: page_num,
                page_size: 2,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(page.total_count, 7);
        assert_eq!(page.total_pages, 4);
        seen += page.results.len();
    }
    assert_eq!(seen, 7);
}

#[test]
fn coordinate_search_orders_by_position() {
    let store = CorpusStore::open_in_memory().unwrap();
    store
        .ingest(
            &meta(1, "Order", &["A"], (1980, 1, 1)),
            "beta alpha\ngamma delta\n",
        )
        .unwrap();

    let page = store.absolute_search(&AbsoluteQuery::default()).unwrap();
    let words: Vec<&str> = page.results.iter().map(|r| r.word.as_str()).collect();
    assert_eq!(words, vec!["beta", "alpha", "gamma", "delta"]);
}
