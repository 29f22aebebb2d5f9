mod goals;
mod steps;
