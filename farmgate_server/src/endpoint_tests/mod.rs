mod helpers;

mod inquiries;
mod orders;
mod payments;
