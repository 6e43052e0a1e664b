//! Property tests for chunking, percentile ranks and position sizing.

use momentum_screener::chunk::{chunk, chunk_count};
use momentum_screener::scoring::percentile_of_score;
use momentum_screener::{
    score_percentiles, select_top, size_positions, PercentileKind, Period, Row, ScoringOptions,
    SortKey,
};
use proptest::prelude::*;

fn kind() -> impl Strategy<Value = PercentileKind> {
    prop_oneof![Just(PercentileKind::Mean), Just(PercentileKind::Midrank)]
}

proptest! {
    #[test]
    fn chunks_reassemble_the_input(items in prop::collection::vec(any::<u16>(), 0..300), size in 1usize..120) {
        let chunks: Vec<&[u16]> = chunk(&items, size).unwrap().collect();

        prop_assert_eq!(chunks.len(), chunk_count(items.len(), size));
        prop_assert!(chunks.iter().all(|c| !c.is_empty() && c.len() <= size));
        let joined: Vec<u16> = chunks.concat();
        prop_assert_eq!(joined, items);
    }

    #[test]
    fn percentile_stays_in_unit_interval(
        population in prop::collection::vec(-5.0f64..5.0, 1..60),
        pick in any::<prop::sample::Index>(),
        kind in kind(),
    ) {
        let value = population[pick.index(population.len())];
        let pct = percentile_of_score(&population, value, kind).unwrap();
        prop_assert!((0.0..=1.0).contains(&pct), "{pct}");
    }

    #[test]
    fn higher_return_never_ranks_lower(
        returns in prop::collection::vec(-1.0f64..3.0, 2..40),
        kind in kind(),
    ) {
        let rows: Vec<Row> = returns
            .iter()
            .enumerate()
            .map(|(i, r)| Row::new(format!("S{i}"), 10.0).with_return(Period::OneYear, *r))
            .collect();
        let options = ScoringOptions { percentile_kind: kind, ..Default::default() };
        let scored = score_percentiles(rows, &[Period::OneYear], options).rows;

        for a in &scored {
            for b in &scored {
                if a.period_return(Period::OneYear) > b.period_return(Period::OneYear) {
                    prop_assert!(a.composite_score > b.composite_score);
                }
            }
        }
    }

    #[test]
    fn selection_is_sorted_and_bounded(
        returns in prop::collection::vec(-1.0f64..3.0, 1..80),
        n in 1usize..100,
    ) {
        let rows: Vec<Row> = returns
            .iter()
            .enumerate()
            .map(|(i, r)| Row::new(format!("S{i}"), 10.0).with_return(Period::OneYear, *r))
            .collect();
        let top = select_top(rows, SortKey::Return(Period::OneYear), n).unwrap();

        prop_assert_eq!(top.len(), n.min(returns.len()));
        for pair in top.windows(2) {
            prop_assert!(pair[0].period_return(Period::OneYear) >= pair[1].period_return(Period::OneYear));
        }
    }

    #[test]
    fn sizing_never_overspends(
        prices in prop::collection::vec(0.01f64..5_000.0, 1..100),
        capital in 1.0f64..10_000_000.0,
    ) {
        let rows: Vec<Row> = prices
            .iter()
            .enumerate()
            .map(|(i, p)| Row::new(format!("S{i}"), *p))
            .collect();
        let plan = size_positions(rows, capital).unwrap();

        prop_assert_eq!(plan.len(), prices.len());
        prop_assert!(plan.total_cost() <= capital * (1.0 + 1e-9));
        for position in &plan.positions {
            prop_assert!(position.cost() <= plan.allocation_per_position * (1.0 + 1e-9));
        }
    }
}
