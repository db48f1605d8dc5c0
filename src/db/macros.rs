/// Append `column = ?N` to a dynamic UPDATE when an `Option` input field is set.
///
/// The value is pushed onto `values` at the same time, so placeholders stay in
/// step with the parameter list. Works for `Option<T>` and for
/// `Option<Option<T>>` (the inner `None` clears the column).
///
/// ```ignore
/// let mut sets: Vec<String> = Vec::new();
/// let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
/// push_field!(input.name, "name", sets, values);
/// ```
#[macro_export]
macro_rules! push_field {
    ($field:expr, $col:literal, $sets:expr, $values:expr) => {
        if let Some(ref v) = $field {
            $values.push(Box::new(v.clone()) as Box<dyn rusqlite::types::ToSql>);
            $sets.push(format!("{} = ?{}", $col, $values.len()));
        }
    };
}
