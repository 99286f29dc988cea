//! Stylesheets embedded in every rendered resume.

/// Screen and print layout for the A4 page container.
pub const BASE_STYLES: &str = "
body, html {
  margin: 0;
  padding: 0;
  font-family: Arial, sans-serif;
  font-size: 12px;
  line-height: 1.5;
  color: #333;
  background-color: white;
}
.resume-container {
  width: 210mm;
  min-height: 297mm;
  padding: 0;
  margin: 0 auto;
  background-color: white;
  position: relative;
  box-sizing: border-box;
}
.resume-page {
  width: 100%;
  min-height: 297mm;
  padding: 20mm;
  box-sizing: border-box;
  position: relative;
}
.section { margin-bottom: 15px; }
.section-title {
  font-size: 16px;
  font-weight: bold;
  margin-bottom: 10px;
  color: #2a3b8f;
}
.section-content { margin-left: 0; white-space: pre-line; }
.personal-info .name { font-size: 24px; margin-bottom: 5px; }
.personal-info .title { font-size: 16px; margin-top: 0; color: #555; }
.personal-info .contact {
  display: flex;
  justify-content: space-between;
  margin-top: 10px;
}
.entry { margin-bottom: 10px; white-space: normal; }
.entry-title { font-weight: bold; }
.entry-subtitle { font-style: italic; }
.entry-date { color: #666; }
.entry-description { margin-top: 5px; white-space: pre-line; }
.skills-list {
  columns: 2;
  column-gap: 20px;
  list-style-type: none;
  padding-left: 0;
  white-space: normal;
}
";

/// Page rules applied when the document is exported.
pub const PRINT_STYLES: &str = "
@page {
  margin: 0;
  size: A4;
}
@media print {
  body { margin: 0; padding: 0; }
  .resume-page {
    page-break-after: always;
    page-break-inside: avoid;
  }
  [data-page=\"2\"] { page-break-before: always; }
}
";
