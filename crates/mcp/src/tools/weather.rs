// Weather and clock lookups for a single supported city

use crate::protocol::ToolSchema;
use crate::tools::{json_schema_object, json_schema_string, parse_arguments, Tool, ToolTier};
use anyhow::Result;
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Offset, Utc, Weekday};
use serde::Deserialize;
use std::sync::Arc;
use toolbelt_core::Envelope;

/// The only city with canned data. Matching is exact and case-sensitive.
pub const SUPPORTED_CITY: &str = "New York";

const NEW_YORK_REPORT: &str =
    "The weather in New York is sunny with a temperature of 25 degrees Celsius (77 degrees Fahrenheit).";

#[derive(Debug, Deserialize)]
struct CityArgs {
    city: String,
}

fn city_schema(name: &str, description: &str) -> ToolSchema {
    ToolSchema {
        name: name.to_string(),
        description: description.to_string(),
        input_schema: json_schema_object(
            serde_json::json!({
                "city": json_schema_string("Name of the city (e.g. \"New York\")")
            }),
            vec!["city"],
        ),
    }
}

/// Canned weather report
pub struct WeatherTool;

impl WeatherTool {
    pub fn lookup(city: &str) -> Envelope {
        if city == SUPPORTED_CITY {
            Envelope::report(NEW_YORK_REPORT)
        } else {
            Envelope::error(format!("Weather information for '{}' is not available.", city))
        }
    }
}

#[async_trait::async_trait]
impl Tool for WeatherTool {
    fn schema(&self) -> ToolSchema {
        city_schema(
            "get_weather",
            "Retrieve the current weather report for a specified city",
        )
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<Envelope> {
        let args: CityArgs = parse_arguments("get_weather", arguments)?;
        Ok(Self::lookup(&args.city))
    }

    fn tier(&self) -> ToolTier {
        ToolTier::Tier0
    }
}

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Current local time in the supported city
pub struct CurrentTimeTool {
    clock: Clock,
}

impl CurrentTimeTool {
    pub fn new() -> Self {
        Self {
            clock: Arc::new(Utc::now),
        }
    }

    /// Fixed or custom time source, mainly for tests.
    pub fn with_clock(clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        Self {
            clock: Arc::new(clock),
        }
    }

    pub fn lookup(&self, city: &str) -> Envelope {
        if city != SUPPORTED_CITY {
            return Envelope::error(format!(
                "Sorry, I don't have timezone information for {}.",
                city
            ));
        }

        let now = (self.clock)();
        let (offset, abbreviation) = us_eastern_offset(now);
        let local = now.with_timezone(&offset);

        Envelope::report(format!(
            "The current time in {} is {} {}{}",
            city,
            local.format("%Y-%m-%d %H:%M:%S"),
            abbreviation,
            local.format("%z")
        ))
    }
}

impl Default for CurrentTimeTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Tool for CurrentTimeTool {
    fn schema(&self) -> ToolSchema {
        city_schema(
            "get_current_time",
            "Return the current time in a specified city",
        )
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<Envelope> {
        let args: CityArgs = parse_arguments("get_current_time", arguments)?;
        Ok(self.lookup(&args.city))
    }
}

/// UTC offset and abbreviation for US Eastern time at `instant`.
///
/// Daylight time runs from 02:00 EST on the second Sunday of March to
/// 02:00 EDT on the first Sunday of November.
fn us_eastern_offset(instant: DateTime<Utc>) -> (FixedOffset, &'static str) {
    const HOUR: i32 = 3600;
    let standard = (FixedOffset::west_opt(5 * HOUR), "EST");
    let daylight = (FixedOffset::west_opt(4 * HOUR), "EDT");

    let year = instant.year();
    let transition = |month: u32, nth: u8, utc_hour: u32| {
        NaiveDate::from_weekday_of_month_opt(year, month, Weekday::Sun, nth)
            .and_then(|day| day.and_hms_opt(utc_hour, 0, 0))
            .map(|naive| naive.and_utc())
    };

    let in_daylight = match (transition(3, 2, 7), transition(11, 1, 6)) {
        (Some(start), Some(end)) => instant >= start && instant < end,
        _ => false,
    };

    let (offset, abbreviation) = if in_daylight { daylight } else { standard };
    // -5h and -4h are always in range
    (offset.unwrap_or_else(|| Utc.fix()), abbreviation)
}
