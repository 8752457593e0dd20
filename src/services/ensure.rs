use crate::domain::models::Ensured;
use crate::error::Result;

/// Run `create` only when `check` reports the thing is absent.
pub fn ensure_idempotent<C, M>(check: C, create: M) -> Result<Ensured>
where
    C: FnOnce() -> Result<bool>,
    M: FnOnce() -> Result<()>,
{
    if check()? {
        return Ok(Ensured::Existed);
    }
    create()?;
    Ok(Ensured::Created)
}
