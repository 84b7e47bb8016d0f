use chrono::{Datelike, Utc};
use dotenvy::dotenv;
use std::env;
use sunday_attendance::{
    config::{database, settings},
    core::{
        calendar::OrgCalendar,
        import,
        permissions::{self, Actor},
        report, roster, session,
    },
    errors::{Error, Result},
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const USAGE: &str = concat!(
    "usage: sunday-attendance ",
    "[stats [YEAR [CLASS_ID]] | import FILE | role admin|head-teacher|teacher TEACHER_ID|clear]"
);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file, env vars can also be set externally
    if dotenv().is_err() {
        info!("No .env file loaded");
    }

    // 3. Settings and calendar
    let settings = settings::load_default_settings()
        .inspect_err(|e| error!("Failed to load settings: {e}"))?;
    let calendar = settings.calendar.org_calendar()?;

    // 4. Database
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {e}"))?;
    database::create_tables(&db).await?;

    let args: Vec<String> = env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    match args.as_slice() {
        [] | ["stats"] => print_statistics(&db, &calendar, Utc::now().year(), None).await,
        ["stats", year] => print_statistics(&db, &calendar, parse_year(year)?, None).await,
        ["stats", year, class_id] => {
            print_statistics(&db, &calendar, parse_year(year)?, Some(*class_id)).await
        }
        ["import", path] => {
            let json = tokio::fs::read_to_string(path).await?;
            let rows = import::parse_rows(&json)?;
            let report = import::import_rows(&db, &calendar, rows).await?;
            println!(
                "{} inserted, {} replaced, {} rejected",
                report.inserted, report.replaced, report.rejected
            );
            Ok(())
        }
        ["role", "clear"] => session::clear_actor(&db).await,
        ["role", "admin"] => session::save_actor(&db, &Actor::admin()).await,
        ["role", "head-teacher"] => session::save_actor(&db, &Actor::head_teacher()).await,
        ["role", "teacher", teacher_id] => {
            let teacher = roster::require_teacher(&db, teacher_id).await?;
            session::save_actor(&db, &Actor::teacher(teacher.id, teacher.name)).await
        }
        _ => Err(Error::validation(USAGE)),
    }
}

fn parse_year(value: &str) -> Result<i32> {
    value
        .parse()
        .map_err(|_| Error::validation(format!("'{value}' is not a year")))
}

async fn print_statistics(
    db: &sea_orm::DatabaseConnection,
    calendar: &OrgCalendar,
    year: i32,
    class_id: Option<&str>,
) -> Result<()> {
    let actor = session::load_actor(db).await?;
    if !permissions::can_view_statistics(&actor) {
        warn!("Statistics need the admin or head-teacher role");
    }
    let stats = report::head_statistics(db, calendar, &actor, year, class_id, Utc::now()).await?;

    println!("Weekly attendance {year}");
    for row in &stats.weeks {
        println!("  {}", report::format_weekly_row(row));
    }
    println!("Students");
    for row in &stats.students {
        println!("  {}", report::format_student_row(row));
    }
    Ok(())
}
