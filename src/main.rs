use sortie::error::AppResult;

fn main() -> AppResult<()> {
    sortie::entry::run()
}
