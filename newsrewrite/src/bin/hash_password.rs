use newsrewrite::auth::hash_password;

fn main() -> anyhow::Result<()> {
    let Some(password) = std::env::args().nth(1) else {
        eprintln!("Usage: hash_password <password>");
        std::process::exit(2);
    };

    println!("{}", hash_password(&password)?);
    Ok(())
}
