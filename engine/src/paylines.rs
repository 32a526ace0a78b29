//! Payline evaluation.
//!
//! Pure computation over a grid and immutable configuration; all monetary
//! quantities are integral smallest units so independently-run verifications
//! can never disagree by a rounding mode.

use reelgate_types::{Grid, Paytable, PaylinePattern, SymbolId, WinningLine};

/// Evaluate the active payline patterns against a grid.
///
/// For each pattern, walks the row-per-reel path from reel 0 and counts the
/// longest contiguous run matching the line's anchor symbol. The anchor is
/// the first non-wild symbol on the line (an all-wild line anchors on the
/// wild itself); a configured wild extends any run. Runs shorter than 3 pay
/// nothing; otherwise the payout is `multiplier(anchor, run) × bet_per_line`.
///
/// Results are in payline-index order so output is reproducible for
/// verification and golden-file testing.
pub fn evaluate_paylines(
    grid: &Grid,
    patterns: &[PaylinePattern],
    paytable: &Paytable,
    bet_per_line: u64,
) -> Vec<WinningLine> {
    let mut winning = Vec::new();
    for (index, pattern) in patterns.iter().enumerate() {
        if !pattern.fits(&grid.layout()) {
            continue;
        }
        let Some((symbol, match_count)) = line_run(grid, pattern, paytable) else {
            continue;
        };
        if match_count < 3 {
            continue;
        }
        let payout = paytable
            .multiplier(symbol, match_count)
            .saturating_mul(bet_per_line);
        if payout == 0 {
            continue;
        }
        winning.push(WinningLine {
            payline_index: index as u8,
            symbol,
            match_count,
            payout,
        });
    }
    winning
}

/// Total payout across winning lines.
pub fn total_payout(lines: &[WinningLine]) -> u64 {
    lines
        .iter()
        .fold(0u64, |total, line| total.saturating_add(line.payout))
}

/// The anchor symbol of a line and the length of its initial run.
///
/// Returns `None` when the line cannot pay at all (anchor is unpaid, e.g. a
/// blank with no paytable entry).
fn line_run(grid: &Grid, pattern: &PaylinePattern, paytable: &Paytable) -> Option<(SymbolId, u8)> {
    let symbols: Vec<SymbolId> = pattern
        .0
        .iter()
        .enumerate()
        .map(|(reel, row)| grid.symbol(reel as u8, *row))
        .collect();

    // Anchor on the first non-wild symbol; an all-wild line pays as wilds.
    let anchor = symbols
        .iter()
        .copied()
        .find(|symbol| !paytable.is_wild(*symbol))
        .unwrap_or(symbols[0]);
    paytable.entry(anchor)?;

    let mut run = 0u8;
    for symbol in &symbols {
        if *symbol == anchor || paytable.is_wild(*symbol) {
            run += 1;
        } else {
            break;
        }
    }
    Some((anchor, run))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelgate_types::{PaytableEntry, ReelLayout};
    use SymbolId::*;

    /// Build a 5×3 grid from rows (row-major input for readable tests).
    fn grid_from_rows(rows: [[SymbolId; 5]; 3]) -> Grid {
        let layout = ReelLayout::new(5, 3);
        let mut symbols = Vec::with_capacity(15);
        for reel in 0..5 {
            for row in rows.iter() {
                symbols.push(row[reel]);
            }
        }
        Grid::new(layout, symbols).unwrap()
    }

    fn paytable(entries: Vec<PaytableEntry>, wild: Option<SymbolId>) -> Paytable {
        Paytable { entries, wild }
    }

    #[test]
    fn test_top_row_triple_pays() {
        // Top row Seven,Seven,Seven,Bar,Bar with {Seven: match3=5} and bet 1
        // pays exactly one line of 5.
        let grid = grid_from_rows([
            [Seven, Seven, Seven, Bar, Bar],
            [Cherry, Lemon, Orange, Plum, Bell],
            [Blank, Diamond, Blank, Lemon, Cherry],
        ]);
        let patterns = vec![PaylinePattern(vec![0, 0, 0, 0, 0])];
        let paytable = paytable(
            vec![PaytableEntry {
                symbol: Seven,
                three: 5,
                four: 20,
                five: 100,
            }],
            None,
        );

        let lines = evaluate_paylines(&grid, &patterns, &paytable, 1);
        assert_eq!(
            lines,
            vec![WinningLine {
                payline_index: 0,
                symbol: Seven,
                match_count: 3,
                payout: 5,
            }]
        );
        assert_eq!(total_payout(&lines), 5);
    }

    #[test]
    fn test_run_must_start_at_reel_zero() {
        // Four matching symbols, but not anchored at reel 0.
        let grid = grid_from_rows([
            [Cherry, Seven, Seven, Seven, Seven],
            [Lemon, Lemon, Lemon, Lemon, Lemon],
            [Bar, Bar, Bar, Bar, Bar],
        ]);
        let patterns = vec![PaylinePattern(vec![0, 0, 0, 0, 0])];
        let paytable = paytable(
            vec![PaytableEntry {
                symbol: Seven,
                three: 5,
                four: 20,
                five: 100,
            }],
            None,
        );
        assert!(evaluate_paylines(&grid, &patterns, &paytable, 1).is_empty());
    }

    #[test]
    fn test_run_shorter_than_three_pays_nothing() {
        let grid = grid_from_rows([
            [Seven, Seven, Bar, Seven, Seven],
            [Lemon, Lemon, Lemon, Lemon, Lemon],
            [Bar, Bar, Bar, Bar, Bar],
        ]);
        let patterns = vec![PaylinePattern(vec![0, 0, 0, 0, 0])];
        let paytable = paytable(
            vec![PaytableEntry {
                symbol: Seven,
                three: 5,
                four: 20,
                five: 100,
            }],
            None,
        );
        assert!(evaluate_paylines(&grid, &patterns, &paytable, 1).is_empty());
    }

    #[test]
    fn test_blank_never_pays() {
        let grid = grid_from_rows([
            [Blank, Blank, Blank, Blank, Blank],
            [Lemon, Lemon, Lemon, Lemon, Lemon],
            [Bar, Bar, Bar, Bar, Bar],
        ]);
        let patterns = vec![PaylinePattern(vec![0, 0, 0, 0, 0])];
        // Blank intentionally has no entry.
        let paytable = paytable(
            vec![PaytableEntry {
                symbol: Seven,
                three: 5,
                four: 20,
                five: 100,
            }],
            None,
        );
        assert!(evaluate_paylines(&grid, &patterns, &paytable, 1).is_empty());
    }

    #[test]
    fn test_wild_extends_run() {
        let grid = grid_from_rows([
            [Seven, Diamond, Seven, Seven, Bar],
            [Lemon, Lemon, Lemon, Lemon, Lemon],
            [Bar, Bar, Bar, Bar, Bar],
        ]);
        let patterns = vec![PaylinePattern(vec![0, 0, 0, 0, 0])];
        let paytable = paytable(
            vec![PaytableEntry {
                symbol: Seven,
                three: 5,
                four: 20,
                five: 100,
            }],
            Some(Diamond),
        );

        let lines = evaluate_paylines(&grid, &patterns, &paytable, 2);
        assert_eq!(
            lines,
            vec![WinningLine {
                payline_index: 0,
                symbol: Seven,
                match_count: 4,
                payout: 40,
            }]
        );
    }

    #[test]
    fn test_wild_anchor_resolves_to_first_paying_symbol() {
        let grid = grid_from_rows([
            [Diamond, Seven, Seven, Bar, Bar],
            [Lemon, Lemon, Lemon, Lemon, Lemon],
            [Bar, Bar, Bar, Bar, Bar],
        ]);
        let patterns = vec![PaylinePattern(vec![0, 0, 0, 0, 0])];
        let paytable = paytable(
            vec![PaytableEntry {
                symbol: Seven,
                three: 5,
                four: 20,
                five: 100,
            }],
            Some(Diamond),
        );

        let lines = evaluate_paylines(&grid, &patterns, &paytable, 1);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].symbol, Seven);
        assert_eq!(lines[0].match_count, 3);
    }

    #[test]
    fn test_multiple_lines_in_index_order() {
        let grid = grid_from_rows([
            [Seven, Seven, Seven, Bar, Bar],
            [Bell, Bell, Bell, Bell, Bell],
            [Cherry, Lemon, Orange, Plum, Bar],
        ]);
        let patterns = vec![
            PaylinePattern(vec![1, 1, 1, 1, 1]), // middle row, full house of bells
            PaylinePattern(vec![0, 0, 0, 0, 0]), // top row, triple sevens
            PaylinePattern(vec![2, 2, 2, 2, 2]), // bottom row, nothing
        ];
        let paytable = paytable(
            vec![
                PaytableEntry {
                    symbol: Seven,
                    three: 5,
                    four: 20,
                    five: 100,
                },
                PaytableEntry {
                    symbol: Bell,
                    three: 10,
                    four: 25,
                    five: 60,
                },
            ],
            None,
        );

        let lines = evaluate_paylines(&grid, &patterns, &paytable, 1);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].payline_index, 0);
        assert_eq!(lines[0].symbol, Bell);
        assert_eq!(lines[0].match_count, 5);
        assert_eq!(lines[1].payline_index, 1);
        assert_eq!(lines[1].symbol, Seven);
        assert_eq!(total_payout(&lines), 60 + 5);
    }

    #[test]
    fn test_diagonal_pattern() {
        let grid = grid_from_rows([
            [Bar, Lemon, Cherry, Lemon, Bar],
            [Lemon, Bar, Lemon, Bar, Lemon],
            [Cherry, Cherry, Bar, Cherry, Cherry],
        ]);
        // V shape: rows 0,1,2,1,0 all hold Bar.
        let patterns = vec![PaylinePattern(vec![0, 1, 2, 1, 0])];
        let paytable = paytable(
            vec![PaytableEntry {
                symbol: Bar,
                three: 20,
                four: 50,
                five: 150,
            }],
            None,
        );

        let lines = evaluate_paylines(&grid, &patterns, &paytable, 3);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].match_count, 5);
        assert_eq!(lines[0].payout, 450);
    }

    #[test]
    fn test_payout_saturates_instead_of_overflowing() {
        let grid = grid_from_rows([
            [Seven, Seven, Seven, Seven, Seven],
            [Lemon, Lemon, Lemon, Lemon, Lemon],
            [Bar, Bar, Bar, Bar, Bar],
        ]);
        let patterns = vec![PaylinePattern(vec![0, 0, 0, 0, 0])];
        let paytable = paytable(
            vec![PaytableEntry {
                symbol: Seven,
                three: 5,
                four: 20,
                five: u64::MAX,
            }],
            None,
        );

        let lines = evaluate_paylines(&grid, &patterns, &paytable, 2);
        assert_eq!(lines[0].payout, u64::MAX);
        assert_eq!(total_payout(&lines), u64::MAX);
    }
}
