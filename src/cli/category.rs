use crate::categorizer::{delete_category, rename_category};
use crate::cli::connect;
use crate::error::Result;
use crate::store::category_names;

pub fn rename(old: &str, new: &str) -> Result<()> {
    let (_, mut conn) = connect()?;
    let n = rename_category(&mut conn, old, new)?;
    println!("Renamed {old} \u{2192} {new} ({n} transactions)");
    Ok(())
}

pub fn delete(name: &str) -> Result<()> {
    let (_, mut conn) = connect()?;
    let result = delete_category(&mut conn, name)?;
    println!(
        "Deleted {name}: {} transactions uncategorized, {} filters removed",
        result.reset, result.filters_deleted
    );
    Ok(())
}

pub fn list() -> Result<()> {
    let (_, conn) = connect()?;
    for name in category_names(&conn)? {
        println!("{name}");
    }
    Ok(())
}
