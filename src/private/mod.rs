pub mod cstr;

#[cfg(test)]
pub mod testing;
