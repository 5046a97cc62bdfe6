mod harness;
mod prediction_flow;
mod surface;
