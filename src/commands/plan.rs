//! The `plan` command: show the static execution plan without running.

use crate::cli::PlanArgs;
use crate::config;
use crate::error::Result;
use crate::exit_codes;
use crate::registry::Registry;
use crate::report;

pub fn cmd_plan(args: PlanArgs) -> Result<i32> {
    let config = config::resolve(args.config.as_deref())?;
    let registry = Registry::load(&config.steps)?;
    let plan = report::assemble_plan(&registry);

    if args.json {
        println!("{}", plan.to_json());
    } else {
        print!("{}", plan.render_table());
    }

    Ok(exit_codes::SUCCESS)
}
