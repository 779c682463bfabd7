pub mod period;
pub mod station;

#[cfg(test)]
mod test;
