use std::fs;
use std::path::{Path, PathBuf};

use dsa_adapters::{
    parse_codeforces_listing, parse_codeforces_problem_page, parse_gfg_listing_page,
    parse_gfg_problem_page, parse_interviewbit_listing, parse_interviewbit_problem_page,
    parse_leetcode_listing, GFG_BASE_URL, INTERVIEWBIT_BASE_URL,
};
use dsa_core::Platform;

fn fixture(platform: &str, name: &str) -> String {
    let path: PathBuf = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../fixtures")
        .join(platform)
        .join(name);
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("reading {}: {e}", path.display()))
}

#[test]
fn leetcode_listing_skips_paid_and_malformed_entries() {
    let drafts = parse_leetcode_listing(&fixture("leetcode", "problems_all.json")).expect("parse");

    let titles: Vec<&str> = drafts.iter().map(|d| d.title.as_str()).collect();
    assert_eq!(
        titles,
        vec![
            "Two Sum",
            "Add Two Numbers",
            "Median of Two Sorted Arrays",
            "Mystery Level"
        ]
    );
    assert!(drafts.iter().all(|d| d.platform == Platform::LeetCode));
    assert!(drafts.iter().all(|d| d.tags.is_empty() && d.points.is_none()));

    assert_eq!(drafts[0].url, "https://leetcode.com/problems/two-sum/");
    assert_eq!(drafts[0].difficulty.as_deref(), Some("Easy"));
    assert_eq!(drafts[1].difficulty.as_deref(), Some("Medium"));
    assert_eq!(drafts[2].difficulty.as_deref(), Some("Hard"));
    assert_eq!(drafts[3].difficulty.as_deref(), Some("Unknown"));
}

#[test]
fn codeforces_listing_pairs_statistics_and_skips_nameless() {
    let drafts =
        parse_codeforces_listing(&fixture("codeforces", "problemset_problems.json")).expect("parse");
    assert_eq!(drafts.len(), 2);

    let watermelon = &drafts[0];
    assert_eq!(watermelon.title, "4A - Watermelon");
    assert_eq!(
        watermelon.url,
        "https://codeforces.com/problemset/problem/4/A"
    );
    assert_eq!(watermelon.difficulty.as_deref(), Some("800"));
    // first statistic for a key wins
    assert_eq!(watermelon.points.as_deref(), Some("5000"));
    assert_eq!(watermelon.tags, vec!["brute force", "math"]);

    let unrated = &drafts[1];
    assert_eq!(unrated.title, "1520G - To Go Or Not To Go?");
    assert_eq!(unrated.difficulty.as_deref(), Some("Unknown"));
    assert_eq!(unrated.points.as_deref(), Some("0"));
}

#[test]
fn codeforces_problem_page_yields_tags_and_statement() {
    let details =
        parse_codeforces_problem_page(&fixture("codeforces", "problem_page.html")).expect("parse");
    assert_eq!(details.tags, vec!["brute force", "math"]);
    assert_eq!(
        details.description.as_deref(),
        Some("One hot summer day Pete and his friend Billy decided to buy a watermelon.")
    );
}

#[test]
fn gfg_listing_page_builds_absolute_links() {
    let links =
        parse_gfg_listing_page(&fixture("geeksforgeeks", "explore_page.html"), GFG_BASE_URL)
            .expect("parse");
    assert_eq!(links.len(), 2);
    assert_eq!(links[0].title, "Kadane's Algorithm");
    assert_eq!(
        links[0].url,
        "https://practice.geeksforgeeks.org/problems/kadanes-algorithm-1587115620/1"
    );
    assert_eq!(links[1].title, "Missing number in array");
}

#[test]
fn gfg_problem_page_extracts_difficulty_tags_and_solved_count() {
    let details =
        parse_gfg_problem_page(&fixture("geeksforgeeks", "problem_page.html")).expect("parse");
    assert_eq!(details.difficulty.as_deref(), Some("Medium"));
    assert_eq!(details.points.as_deref(), Some("152340"));
    assert_eq!(details.tags, vec!["Arrays", "Dynamic Programming"]);
}

#[test]
fn interviewbit_listing_walks_selector_fallbacks() {
    let drafts = parse_interviewbit_listing(
        &fixture("interviewbit", "arrays.html"),
        INTERVIEWBIT_BASE_URL,
    )
    .expect("parse");
    assert_eq!(drafts.len(), 3);
    assert!(drafts.iter().all(|d| d.tags == vec!["Arrays"]));

    let grid = &drafts[0];
    assert_eq!(grid.title, "Min Steps in Infinite Grid");
    assert_eq!(
        grid.url,
        "https://www.interviewbit.com/problems/min-steps-in-infinite-grid/"
    );
    assert_eq!(grid.difficulty.as_deref(), Some("Easy"));
    assert_eq!(grid.points.as_deref(), Some("150"));

    let subarray = &drafts[1];
    assert_eq!(subarray.title, "Max Sum Contiguous Subarray");
    assert_eq!(subarray.url, "https://www.interviewbit.com");
    assert_eq!(subarray.difficulty.as_deref(), Some("Medium"));
    assert_eq!(subarray.points.as_deref(), Some("0"));

    // span.difficulty matched with no text; the empty value is kept
    let spiral = &drafts[2];
    assert_eq!(spiral.difficulty.as_deref(), Some(""));
    assert_eq!(spiral.points.as_deref(), Some("200"));
}

#[test]
fn interviewbit_problem_page_appends_tags_to_default() {
    let details = parse_interviewbit_problem_page(&fixture("interviewbit", "problem_page.html"))
        .expect("parse");
    assert_eq!(details.tags, vec!["Arrays", "Math", "Geometry"]);
    assert!(details
        .description
        .as_deref()
        .is_some_and(|d| d.starts_with("You are in an infinite 2D grid")));
}
