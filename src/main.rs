use llmspeed::entry;
use llmspeed::error::AppResult;

fn main() -> AppResult<()> {
    entry::run()
}
