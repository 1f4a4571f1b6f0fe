use anyhow::Result;
use s9s_ft::config::Settings;
use s9s_ft::counters::CounterStore;

use crate::cli::output;

pub(crate) fn run_counters_show(settings: &Settings) -> Result<()> {
    let store = CounterStore::load(&settings.counters.file)?;
    output::print_counters(&store);
    Ok(())
}

pub(crate) fn run_counters_reset(settings: &Settings) -> Result<()> {
    let mut store = CounterStore::load(&settings.counters.file)?;
    store.reset();
    store.save()?;
    output::print_counters(&store);
    Ok(())
}
