use chrono::NaiveDate;

pub fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect()
}

/// Parse a `YYYY-MM-DD` calendar day.
pub fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|err| format!("expected YYYY-MM-DD, got `{s}`: {err}"))
}

/// Parse a probability in `0.0..=1.0`.
pub fn parse_rate(s: &str) -> Result<f64, String> {
    let rate: f64 = s
        .trim()
        .parse()
        .map_err(|err| format!("invalid rate `{s}`: {err}"))?;
    if (0.0..=1.0).contains(&rate) {
        Ok(rate)
    } else {
        Err(format!("rate must be between 0 and 1, got {rate}"))
    }
}

/// Lowercase slug used for generated ids.
pub fn slugify(s: &str) -> String {
    let mut slug = String::with_capacity(s.len());
    for ch in s.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Split `Title: Sub one / Sub two` into a task title and its subtask titles.
pub fn split_task_entry(s: &str) -> (String, Vec<String>) {
    match s.split_once(':') {
        Some((title, subtasks)) => (
            title.trim().to_string(),
            subtasks
                .split('/')
                .map(|x| x.trim().to_string())
                .filter(|x| !x.is_empty())
                .collect(),
        ),
        None => (s.trim().to_string(), Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_csv_trims_and_drops_empty() {
        assert_eq!(split_csv(" a, b ,,c"), vec!["a", "b", "c"]);
        assert!(split_csv(" , ").is_empty());
    }

    #[test]
    fn dates_and_rates_parse() {
        assert_eq!(
            parse_date("2024-02-29"),
            Ok(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())
        );
        assert!(parse_date("2023-02-29").is_err());
        assert_eq!(parse_rate("0.75"), Ok(0.75));
        assert!(parse_rate("1.5").is_err());
        assert!(parse_rate("half").is_err());
    }

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("  Morning Run!! "), "morning-run");
        assert_eq!(slugify("Read 20 pages"), "read-20-pages");
        assert_eq!(slugify("***"), "");
    }

    #[test]
    fn task_specs_split_subtasks() {
        assert_eq!(split_task_entry("Stretch"), ("Stretch".to_string(), vec![]));
        assert_eq!(
            split_task_entry("Workout: Warmup / Lift /"),
            (
                "Workout".to_string(),
                vec!["Warmup".to_string(), "Lift".to_string()]
            )
        );
    }
}
