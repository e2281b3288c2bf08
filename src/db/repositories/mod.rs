mod cycles;
mod sessions;
mod summaries;
