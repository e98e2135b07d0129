

#[cfg(test)]
mod edge_cases;

#[cfg(test)]
mod filtering;

#[cfg(test)]
mod nested;
