use colored::Colorize;

use crate::domain::entities::consistency::{CategoryResult, ConsistencyVerdict};

/// Renders check results to the terminal, one colored line per finding:
/// red for an omission, green when fine, yellow for anything else.
///
/// Pure rendering; iterates the results in their insertion order.
pub fn display_results(results: &[CategoryResult]) {
    for category_result in results {
        println!("\nCategory: {}", category_result.category);

        for (observation, verdict) in &category_result.findings {
            let line = format!("Observation: {} -> Status: {}", observation, verdict);

            match verdict {
                ConsistencyVerdict::Omission { .. } => println!("{}", line.red()),
                ConsistencyVerdict::Fine { .. } => println!("{}", line.green()),
                ConsistencyVerdict::NoDocumentsFound => println!("{}", line.yellow()),
            }
        }
    }
}
